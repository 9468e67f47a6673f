//! Scanner registrations, identified by the UUID Harbor assigns. Harbor
//! never returns the access credential, so it only takes part in writes.

use crate::controller::drift::FieldSet;
use crate::controller::error::ReconcileError;
use crate::controller::external::ConnectionDetails;
use crate::controller::handle::{Created, ExternalKind, HandleContext};
use crate::controller::identity::{Correlator, ExternalId};
use crate::crd::{ScannerRegistration, ScannerRegistrationObservation, ScannerRegistrationParameters};
use crate::harbor::{ApiError, HarborApi, ScannerRecord, ScannerRequest};
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScannerKind;

fn request(params: &ScannerRegistrationParameters) -> ScannerRequest {
    ScannerRequest {
        name: params.name.clone(),
        url: params.url.clone(),
        description: params.description.clone(),
        auth: params.auth.clone(),
        access_credential: params.access_credential.clone(),
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, ReconcileError> {
    <Uuid as ExternalId>::parse(raw)
        .map_err(|reason| ReconcileError::correlation(format!("scanners/{raw}"), reason))
}

#[async_trait]
impl ExternalKind for ScannerKind {
    type Record = ScannerRegistration;
    type Id = Uuid;
    type Remote = ScannerRecord;

    const KIND: &'static str = "scanner";

    fn correlator(&self) -> Correlator<Uuid> {
        Correlator::new("scanners")
    }

    fn desired_name(&self, record: &ScannerRegistration) -> Result<String, ReconcileError> {
        Ok(record.spec.for_provider.name.clone())
    }

    async fn get(&self, api: &dyn HarborApi, id: &Uuid) -> Result<ScannerRecord, ApiError> {
        api.get_scanner(&id.to_string()).await
    }

    async fn find(&self, api: &dyn HarborApi, name: &str) -> Result<Option<ScannerRecord>, ApiError> {
        api.find_scanner(name).await
    }

    fn id_of(&self, remote: &ScannerRecord) -> Result<Uuid, ReconcileError> {
        parse_uuid(&remote.uuid)
    }

    fn desired_fields(&self, record: &ScannerRegistration) -> FieldSet {
        let params = &record.spec.for_provider;
        FieldSet::new()
            .scalar("url", &params.url)
            .opt_scalar("description", params.description.as_ref())
            .opt_scalar("auth", params.auth.as_ref())
            .opt_scalar("accessCredential", params.access_credential.as_ref())
    }

    fn observed_fields(&self, remote: &ScannerRecord) -> FieldSet {
        FieldSet::new()
            .scalar("url", &remote.url)
            .scalar("description", remote.description.clone().unwrap_or_default())
            .scalar("auth", remote.auth.clone().unwrap_or_default())
    }

    fn observation(&self, remote: &ScannerRecord) -> ScannerRegistrationObservation {
        ScannerRegistrationObservation {
            uuid: Some(remote.uuid.clone()),
            name: Some(remote.name.clone()),
            url: Some(remote.url.clone()),
            is_default: remote.is_default,
            health: remote.health.clone(),
            create_time: remote.create_time.clone(),
            update_time: remote.update_time.clone(),
        }
    }

    async fn create(
        &self,
        ctx: &HandleContext,
        record: &ScannerRegistration,
    ) -> Result<Created<Uuid, ScannerRegistrationObservation>, ReconcileError> {
        let params = &record.spec.for_provider;
        let raw = ctx
            .api
            .create_scanner(&request(params))
            .await
            .map_err(ReconcileError::Create)?;
        let id = parse_uuid(&raw)?;
        Ok(Created {
            id,
            observation: Some(ScannerRegistrationObservation {
                uuid: Some(raw),
                name: Some(params.name.clone()),
                url: Some(params.url.clone()),
                ..Default::default()
            }),
            connection_details: ConnectionDetails::new(),
        })
    }

    async fn update(
        &self,
        ctx: &HandleContext,
        id: &Uuid,
        record: &ScannerRegistration,
        _changed: &FieldSet,
    ) -> Result<ConnectionDetails, ReconcileError> {
        // Harbor replaces the whole registration on PUT
        ctx.api
            .update_scanner(&id.to_string(), &request(&record.spec.for_provider))
            .await
            .map_err(ReconcileError::Update)?;
        Ok(ConnectionDetails::new())
    }

    async fn delete(&self, api: &dyn HarborApi, id: &Uuid) -> Result<(), ApiError> {
        api.delete_scanner(&id.to_string()).await
    }
}
