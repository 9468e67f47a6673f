//! Harbor projects. Feature flags travel as string-valued project metadata,
//! the CVE allowlist is merged rather than replaced, and the storage limit
//! lives on the project's quota.

use crate::controller::drift::FieldSet;
use crate::controller::error::ReconcileError;
use crate::controller::external::ConnectionDetails;
use crate::controller::handle::{Created, ExternalKind, HandleContext};
use crate::controller::identity::Correlator;
use crate::crd::{Project, ProjectObservation, ProjectParameters};
use crate::harbor::{ApiError, CveAllowlist, HarborApi, ProjectRecord, ProjectRequest};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectKind;

/// A project plus its storage quota
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectState {
    pub project: ProjectRecord,
    pub storage_limit: Option<i64>,
}

/// Metadata key and drift field name of each boolean flag
const FLAGS: [(&str, &str); 5] = [
    ("public", "public"),
    ("enable_content_trust", "enableContentTrust"),
    ("enable_content_trust_cosign", "enableContentTrustCosign"),
    ("auto_scan", "autoScanImages"),
    ("prevent_vul", "preventVulnerableImages"),
];

fn flag_values(params: &ProjectParameters) -> [Option<bool>; 5] {
    [
        params.public,
        params.enable_content_trust,
        params.enable_content_trust_cosign,
        params.auto_scan_images,
        params.prevent_vulnerable_images,
    ]
}

/// Harbor project metadata for the set fields of `params`
pub fn desired_metadata(params: &ProjectParameters) -> BTreeMap<String, String> {
    let mut metadata = params.metadata.clone().unwrap_or_default();
    for ((key, _), value) in FLAGS.into_iter().zip(flag_values(params)) {
        if let Some(value) = value {
            metadata.insert(key.to_string(), value.to_string());
        }
    }
    if let Some(severity) = &params.severity {
        metadata.insert("severity".to_string(), severity.clone());
    }
    metadata
}

fn metadata_pairs(metadata: &BTreeMap<String, String>) -> impl Iterator<Item = String> + '_ {
    metadata.iter().map(|(k, v)| format!("{k}={v}"))
}

fn project_details(id: i64) -> ConnectionDetails {
    let mut details = ConnectionDetails::new();
    details.insert("project_id".to_string(), id.to_string().into_bytes());
    details
}

#[async_trait]
impl ExternalKind for ProjectKind {
    type Record = Project;
    type Id = i64;
    type Remote = ProjectState;

    const KIND: &'static str = "project";

    fn correlator(&self) -> Correlator<i64> {
        Correlator::new("projects")
    }

    fn desired_name(&self, record: &Project) -> Result<String, ReconcileError> {
        Ok(record.spec.for_provider.name.clone())
    }

    async fn get(&self, api: &dyn HarborApi, id: &i64) -> Result<ProjectState, ApiError> {
        let project = api.get_project(*id).await?;
        let storage_limit = api.get_project_storage_limit(*id).await?;
        Ok(ProjectState {
            project,
            storage_limit,
        })
    }

    async fn find(&self, api: &dyn HarborApi, name: &str) -> Result<Option<ProjectState>, ApiError> {
        let Some(project) = api.find_project(name).await? else {
            return Ok(None);
        };
        let storage_limit = api.get_project_storage_limit(project.project_id).await?;
        Ok(Some(ProjectState {
            project,
            storage_limit,
        }))
    }

    fn id_of(&self, remote: &ProjectState) -> Result<i64, ReconcileError> {
        Ok(remote.project.project_id)
    }

    fn desired_fields(&self, record: &Project) -> FieldSet {
        let params = &record.spec.for_provider;
        let mut fields = FieldSet::new();
        for ((_, field), value) in FLAGS.into_iter().zip(flag_values(params)) {
            fields = fields.opt_scalar(field, value.map(|v| v.to_string()));
        }
        let extra = params.metadata.clone().unwrap_or_default();
        fields
            .opt_scalar("severity", params.severity.as_ref())
            .additive("metadata", metadata_pairs(&extra))
            .opt_scalar("storageLimit", params.storage_limit)
            .additive(
                "cveAllowlist",
                params.cve_allowlist.iter().flatten().cloned(),
            )
    }

    fn observed_fields(&self, remote: &ProjectState) -> FieldSet {
        let metadata = &remote.project.metadata;
        let mut fields = FieldSet::new();
        for (key, field) in FLAGS {
            let value = metadata.get(key).cloned().unwrap_or_else(|| "false".to_string());
            fields = fields.scalar(field, value);
        }
        fields
            .opt_scalar("severity", metadata.get("severity"))
            .set("metadata", metadata_pairs(metadata))
            .opt_scalar("storageLimit", remote.storage_limit)
            .set(
                "cveAllowlist",
                remote
                    .project
                    .cve_allowlist
                    .iter()
                    .flat_map(|list| list.ids().map(str::to_string)),
            )
    }

    fn observation(&self, remote: &ProjectState) -> ProjectObservation {
        ProjectObservation {
            project_id: Some(remote.project.project_id),
            name: Some(remote.project.name.clone()),
            registry_id: remote.project.registry_id,
            repo_count: remote.project.repo_count,
            metadata: Some(remote.project.metadata.clone()).filter(|m| !m.is_empty()),
            creation_time: remote.project.creation_time.clone(),
        }
    }

    fn observed_details(&self, remote: &ProjectState) -> ConnectionDetails {
        project_details(remote.project.project_id)
    }

    async fn create(
        &self,
        ctx: &HandleContext,
        record: &Project,
    ) -> Result<Created<i64, ProjectObservation>, ReconcileError> {
        let params = &record.spec.for_provider;
        let request = ProjectRequest {
            project_name: Some(params.name.clone()),
            public: params.public,
            metadata: desired_metadata(params),
            cve_allowlist: params.cve_allowlist.as_ref().map(CveAllowlist::from_ids),
            storage_limit: params.storage_limit,
            registry_id: params.registry_id,
        };
        let id = ctx
            .api
            .create_project(&request)
            .await
            .map_err(ReconcileError::Create)?;

        Ok(Created {
            id,
            observation: Some(ProjectObservation {
                project_id: Some(id),
                name: Some(params.name.clone()),
                registry_id: params.registry_id,
                repo_count: Some(0),
                metadata: Some(request.metadata).filter(|m| !m.is_empty()),
                creation_time: None,
            }),
            connection_details: project_details(id),
        })
    }

    async fn update(
        &self,
        ctx: &HandleContext,
        id: &i64,
        record: &Project,
        changed: &FieldSet,
    ) -> Result<ConnectionDetails, ReconcileError> {
        let params = &record.spec.for_provider;
        let mut request = ProjectRequest::default();
        let metadata_changed = FLAGS.iter().any(|(_, field)| changed.contains(field))
            || changed.contains("severity")
            || changed.contains("metadata");
        if metadata_changed {
            request.public = params.public;
            request.metadata = desired_metadata(params);
        }
        if changed.contains("cveAllowlist") {
            // Keep entries added outside the record
            let current = ctx
                .api
                .get_project(*id)
                .await
                .map_err(ReconcileError::Update)?;
            let mut ids: BTreeSet<String> = current
                .cve_allowlist
                .iter()
                .flat_map(|list| list.ids().map(str::to_string))
                .collect();
            ids.extend(params.cve_allowlist.iter().flatten().cloned());
            request.cve_allowlist = Some(CveAllowlist::from_ids(&ids));
        }
        if request != ProjectRequest::default() {
            debug!(project_id = id, "Updating project settings");
            ctx.api
                .update_project(*id, &request)
                .await
                .map_err(ReconcileError::Update)?;
        }
        if changed.contains("storageLimit") {
            if let Some(limit) = params.storage_limit {
                debug!(project_id = id, limit, "Updating project storage limit");
                ctx.api
                    .set_project_storage_limit(*id, limit)
                    .await
                    .map_err(ReconcileError::Update)?;
            }
        }
        Ok(project_details(*id))
    }

    async fn delete(&self, api: &dyn HarborApi, id: &i64) -> Result<(), ApiError> {
        api.delete_project(*id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::drift;

    fn params() -> ProjectParameters {
        ProjectParameters {
            name: "ci".to_string(),
            public: Some(true),
            auto_scan_images: Some(false),
            severity: Some("high".to_string()),
            cve_allowlist: Some(vec!["CVE-2024-0001".to_string()]),
            storage_limit: Some(1024),
            ..Default::default()
        }
    }

    #[test]
    fn test_desired_metadata_uses_harbor_keys() {
        let metadata = desired_metadata(&params());
        assert_eq!(metadata.get("public").map(String::as_str), Some("true"));
        assert_eq!(metadata.get("auto_scan").map(String::as_str), Some("false"));
        assert_eq!(metadata.get("severity").map(String::as_str), Some("high"));
        assert!(!metadata.contains_key("enable_content_trust"));
    }

    #[test]
    fn test_allowlist_extra_entries_are_not_drift() {
        let record = Project::new(
            "ci",
            crate::crd::ProjectSpec {
                resource: crate::crd::ResourceSpec::default(),
                for_provider: params(),
            },
        );
        let mut metadata = desired_metadata(&params());
        metadata.insert("retention_id".to_string(), "3".to_string());
        let remote = ProjectState {
            project: ProjectRecord {
                project_id: 5,
                name: "ci".to_string(),
                metadata,
                cve_allowlist: Some(CveAllowlist::from_ids(&[
                    "CVE-2024-0001".to_string(),
                    "CVE-2024-0002".to_string(),
                ])),
                ..Default::default()
            },
            storage_limit: Some(1024),
        };
        let kind = ProjectKind;
        let report = drift::detect(&kind.desired_fields(&record), &kind.observed_fields(&remote));
        assert!(report.up_to_date(), "{:?}", report.changed);

        let remote = ProjectState {
            storage_limit: Some(2048),
            ..remote
        };
        let report = drift::detect(&kind.desired_fields(&record), &kind.observed_fields(&remote));
        assert_eq!(report.changed.names().collect::<Vec<_>>(), vec!["storageLimit"]);
    }
}
