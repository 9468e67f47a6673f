//! Robot accounts. Harbor reveals the secret once, in the create response,
//! and cannot change a robot afterwards.

use crate::constants::ROBOT_NAME_PREFIX;
use crate::controller::drift::FieldSet;
use crate::controller::error::ReconcileError;
use crate::controller::external::ConnectionDetails;
use crate::controller::handle::{Created, ExternalKind, HandleContext};
use crate::controller::identity::Correlator;
use crate::crd::{RobotAccount, RobotAccountObservation, RobotAccountParameters};
use crate::harbor::{self, ApiError, HarborApi, Robot, RobotCreate, RobotCreated};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};

#[derive(Debug, Clone, Copy, Default)]
pub struct RobotAccountKind;

/// `robot$<name>` for system robots, `robot$<project>+<name>` for project robots
pub fn full_name(params: &RobotAccountParameters) -> Result<String, ReconcileError> {
    if params.level == "project" {
        let project = params
            .permissions
            .first()
            .map(|p| p.namespace.as_str())
            .filter(|ns| !ns.is_empty() && *ns != "*")
            .ok_or_else(|| {
                ReconcileError::InvalidSpec(
                    "project robots need a permission naming their project".to_string(),
                )
            })?;
        Ok(format!("{ROBOT_NAME_PREFIX}{project}+{}", params.name))
    } else {
        Ok(format!("{ROBOT_NAME_PREFIX}{}", params.name))
    }
}

fn permission_keys<'a>(
    permissions: impl IntoIterator<Item = (&'a str, &'a str, &'a str, &'a str)>,
) -> Vec<String> {
    permissions
        .into_iter()
        .map(|(kind, ns, resource, action)| format!("{kind}:{ns}:{resource}:{action}"))
        .collect()
}

/// Connection details for a new robot, including a docker config for `host`
pub fn robot_details(created: &RobotCreated, registry_host: Option<&str>) -> ConnectionDetails {
    let auth = STANDARD.encode(format!("{}:{}", created.name, created.secret));
    let mut details = ConnectionDetails::new();
    details.insert("username".to_string(), created.name.clone().into_bytes());
    details.insert("password".to_string(), created.secret.clone().into_bytes());
    details.insert("robot_id".to_string(), created.id.to_string().into_bytes());
    details.insert("docker-username".to_string(), created.name.clone().into_bytes());
    details.insert("docker-password".to_string(), created.secret.clone().into_bytes());
    if let Some(host) = registry_host {
        let config = serde_json::json!({
            "auths": {
                host: {
                    "username": created.name,
                    "password": created.secret,
                    "auth": auth,
                }
            }
        });
        details.insert("docker-config".to_string(), config.to_string().into_bytes());
    }
    details.insert("docker-auth".to_string(), auth.into_bytes());
    details
}

#[async_trait]
impl ExternalKind for RobotAccountKind {
    type Record = RobotAccount;
    type Id = i64;
    type Remote = Robot;

    const KIND: &'static str = "robot";
    const IMMUTABLE: bool = true;

    fn correlator(&self) -> Correlator<i64> {
        Correlator::new("robots")
    }

    fn desired_name(&self, record: &RobotAccount) -> Result<String, ReconcileError> {
        full_name(&record.spec.for_provider)
    }

    async fn get(&self, api: &dyn HarborApi, id: &i64) -> Result<Robot, ApiError> {
        api.get_robot(*id).await
    }

    async fn find(&self, api: &dyn HarborApi, name: &str) -> Result<Option<Robot>, ApiError> {
        api.find_robot(name).await
    }

    fn id_of(&self, remote: &Robot) -> Result<i64, ReconcileError> {
        Ok(remote.id)
    }

    fn desired_fields(&self, record: &RobotAccount) -> FieldSet {
        let params = &record.spec.for_provider;
        FieldSet::new()
            .scalar("level", &params.level)
            .opt_scalar("description", params.description.as_ref())
            .opt_scalar("duration", params.duration)
            .opt_scalar("disable", params.disable)
            .set(
                "permissions",
                permission_keys(params.permissions.iter().flat_map(|p| {
                    p.access.iter().map(move |a| {
                        (p.kind.as_str(), p.namespace.as_str(), a.resource.as_str(), a.action.as_str())
                    })
                })),
            )
    }

    fn observed_fields(&self, remote: &Robot) -> FieldSet {
        FieldSet::new()
            .opt_scalar("level", remote.level.as_ref())
            .scalar("description", remote.description.clone().unwrap_or_default())
            .opt_scalar("duration", remote.duration)
            .scalar("disable", remote.disable.unwrap_or(false))
            .set(
                "permissions",
                permission_keys(remote.permissions.iter().flat_map(|p| {
                    p.access.iter().map(move |a| {
                        (p.kind.as_str(), p.namespace.as_str(), a.resource.as_str(), a.action.as_str())
                    })
                })),
            )
    }

    fn observation(&self, remote: &Robot) -> RobotAccountObservation {
        RobotAccountObservation {
            id: Some(remote.id),
            full_name: Some(remote.name.clone()),
            level: remote.level.clone(),
            disabled: remote.disable,
            expires_at: remote.expires_at,
            creation_time: remote.creation_time.clone(),
        }
    }

    async fn create(
        &self,
        ctx: &HandleContext,
        record: &RobotAccount,
    ) -> Result<Created<i64, RobotAccountObservation>, ReconcileError> {
        let params = &record.spec.for_provider;
        let request = RobotCreate {
            name: params.name.clone(),
            description: params.description.clone(),
            level: params.level.clone(),
            duration: params.duration.unwrap_or(-1),
            disable: params.disable.unwrap_or(false),
            permissions: params
                .permissions
                .iter()
                .map(|p| harbor::RobotPermission {
                    kind: p.kind.clone(),
                    namespace: p.namespace.clone(),
                    access: p
                        .access
                        .iter()
                        .map(|a| harbor::RobotAccess {
                            resource: a.resource.clone(),
                            action: a.action.clone(),
                        })
                        .collect(),
                })
                .collect(),
        };
        let created = ctx
            .api
            .create_robot(&request)
            .await
            .map_err(ReconcileError::Create)?;

        Ok(Created {
            id: created.id,
            observation: Some(RobotAccountObservation {
                id: Some(created.id),
                full_name: Some(created.name.clone()),
                level: Some(params.level.clone()),
                disabled: Some(request.disable),
                expires_at: created.expires_at,
                creation_time: created.creation_time.clone(),
            }),
            connection_details: robot_details(&created, ctx.registry_host.as_deref()),
        })
    }

    async fn delete(&self, api: &dyn HarborApi, id: &i64) -> Result<(), ApiError> {
        api.delete_robot(*id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{RobotAccess, RobotPermission};

    fn params(level: &str, project: Option<&str>) -> RobotAccountParameters {
        RobotAccountParameters {
            name: "pusher".to_string(),
            description: None,
            level: level.to_string(),
            duration: None,
            disable: None,
            permissions: project
                .map(|ns| RobotPermission {
                    kind: "project".to_string(),
                    namespace: ns.to_string(),
                    access: vec![RobotAccess {
                        resource: "repository".to_string(),
                        action: "push".to_string(),
                    }],
                })
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn test_full_name() {
        assert_eq!(full_name(&params("system", None)).unwrap(), "robot$pusher");
        assert_eq!(
            full_name(&params("project", Some("ci"))).unwrap(),
            "robot$ci+pusher"
        );
        assert!(full_name(&params("project", None)).is_err());
        assert!(full_name(&params("project", Some("*"))).is_err());
    }

    #[test]
    fn test_robot_details() {
        let created = RobotCreated {
            id: 7,
            name: "robot$ci+pusher".to_string(),
            secret: "s3cret".to_string(),
            creation_time: None,
            expires_at: None,
        };
        let details = robot_details(&created, Some("harbor.example.com"));
        assert_eq!(details["username"], b"robot$ci+pusher");
        assert_eq!(details["password"], b"s3cret");
        assert_eq!(details["robot_id"], b"7");
        let auth = STANDARD.encode("robot$ci+pusher:s3cret");
        assert_eq!(details["docker-auth"], auth.as_bytes());

        let config: serde_json::Value = serde_json::from_slice(&details["docker-config"]).unwrap();
        assert_eq!(config["auths"]["harbor.example.com"]["auth"], auth);

        let without_host = robot_details(&created, None);
        assert!(!without_host.contains_key("docker-config"));
    }
}
