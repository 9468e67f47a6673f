//! Harbor REST Client
//!
//! Native REST implementation of [`HarborApi`] for the Harbor v2.0 API.
//! Uses reqwest with HTTP basic auth.
//!
//! References:
//! - [Harbor v2.0 API](https://github.com/goharbor/harbor/blob/main/api/v2.0/swagger.yaml)

use super::models::{
    ErrorBody, ProjectRecord, ProjectRequest, Quota, Robot, RobotCreate, RobotCreated,
    ScannerRecord, ScannerRequest, SysAdminFlag, UserCreate, UserProfileUpdate, UserRecord,
    UserSearchResult,
};
use super::{ApiError, HarborApi, HarborConfig};
use crate::constants::HARBOR_API_PREFIX;
use crate::observability::metrics;
use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, Instrument};
use zeroize::Zeroizing;

/// Page size used when listing
const PAGE_SIZE: usize = 100;

/// Upper bound on pages walked by a name lookup
const MAX_PAGES: usize = 50;

/// Harbor REST client bound to one set of credentials
pub struct HarborClient {
    http_client: Client,
    base_url: String,
    username: String,
    password: Zeroizing<String>,
}

impl std::fmt::Debug for HarborClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HarborClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl HarborClient {
    /// Build a client for `config`
    ///
    /// # Errors
    /// Returns [`ApiError::Transport`] if the URL is malformed or the HTTP
    /// client cannot be constructed.
    pub fn new(config: &HarborConfig, timeout: Duration) -> Result<Self, ApiError> {
        let parsed = reqwest::Url::parse(&config.url)
            .map_err(|e| ApiError::Transport(format!("invalid Harbor URL '{}': {e}", config.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::Transport(format!(
                "unsupported scheme '{}' in Harbor URL",
                parsed.scheme()
            )));
        }

        // Create HTTP client with rustls (configured in Cargo.toml)
        let http_client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {e}")))?;

        let trimmed = config.url.trim_end_matches('/');
        let base_url = if trimmed.ends_with(HARBOR_API_PREFIX) {
            trimmed.to_string()
        } else {
            format!("{trimmed}{HARBOR_API_PREFIX}")
        };
        debug!("Initialized Harbor client for {}", base_url);

        Ok(Self {
            http_client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Build an authenticated request for `path` under the API prefix
    fn make_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(self.password.as_str()))
            .header("Accept", "application/json")
    }

    /// Send a request, recording metrics and mapping non-success statuses
    async fn send(
        &self,
        kind: &'static str,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::increment_external_operation_errors(kind, operation);
                return Err(ApiError::Transport(e.to_string()));
            }
        };
        metrics::record_external_operation(kind, operation, start.elapsed().as_secs_f64());

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let error_text = response.text().await.unwrap_or_default();
        if status != StatusCode::NOT_FOUND {
            metrics::increment_external_operation_errors(kind, operation);
        }
        Err(handle_error_response(status, &error_text))
    }

    async fn list_page<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        path: &str,
        query: &[(&str, String)],
        page: usize,
    ) -> Result<Vec<T>, ApiError> {
        let request = self
            .make_request(Method::GET, path)
            .query(query)
            .query(&[("page", page.to_string()), ("page_size", PAGE_SIZE.to_string())]);
        let response = self.send(kind, "list", request).await?;
        decode(response).await
    }

    async fn project_quota(&self, id: i64) -> Result<Option<Quota>, ApiError> {
        let request = self.make_request(Method::GET, "/quotas").query(&[
            ("reference", "project".to_string()),
            ("reference_id", id.to_string()),
        ]);
        let response = self.send("project", "get_quota", request).await?;
        let quotas: Vec<Quota> = decode(response).await?;
        Ok(quotas.into_iter().next())
    }
}

/// Map a Harbor error response to [`ApiError`]
fn handle_error_response(status: StatusCode, error_text: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(error_text)
        .ok()
        .and_then(|body| body.errors.into_iter().next())
        .map(|entry| {
            if entry.code.is_empty() {
                entry.message
            } else {
                format!("{}: {}", entry.code, entry.message)
            }
        })
        .unwrap_or_else(|| error_text.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::CONFLICT => ApiError::Conflict(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized {
            status: status.as_u16(),
            message,
        },
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

/// Last path segment of the `Location` header Harbor returns on creation
fn id_from_location(response: &Response) -> Result<String, ApiError> {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::Decode("missing or malformed Location header".to_string()))
}

fn numeric_id_from_location(response: &Response) -> Result<i64, ApiError> {
    let raw = id_from_location(response)?;
    raw.parse()
        .map_err(|_| ApiError::Decode(format!("non-numeric id '{raw}' in Location header")))
}

#[async_trait]
impl HarborApi for HarborClient {
    async fn create_robot(&self, robot: &RobotCreate) -> Result<RobotCreated, ApiError> {
        let span = info_span!("harbor.robot.create", robot.name = %robot.name);
        async move {
            let request = self.make_request(Method::POST, "/robots").json(robot);
            let response = self.send("robot", "create", request).await?;
            decode(response).await
        }
        .instrument(span)
        .await
    }

    async fn get_robot(&self, id: i64) -> Result<Robot, ApiError> {
        let span = info_span!("harbor.robot.get", robot.id = id);
        async move {
            let request = self.make_request(Method::GET, &format!("/robots/{id}"));
            let response = self.send("robot", "get", request).await?;
            decode(response).await
        }
        .instrument(span)
        .await
    }

    async fn find_robot(&self, name: &str) -> Result<Option<Robot>, ApiError> {
        let span = info_span!("harbor.robot.find", robot.name = %name);
        async move {
            for page in 1..=MAX_PAGES {
                let robots: Vec<Robot> = self.list_page("robot", "/robots", &[], page).await?;
                let last = robots.len() < PAGE_SIZE;
                if let Some(found) = robots.into_iter().find(|r| r.name == name) {
                    return Ok(Some(found));
                }
                if last {
                    break;
                }
            }
            Ok(None)
        }
        .instrument(span)
        .await
    }

    async fn delete_robot(&self, id: i64) -> Result<(), ApiError> {
        let span = info_span!("harbor.robot.delete", robot.id = id);
        async move {
            let request = self.make_request(Method::DELETE, &format!("/robots/{id}"));
            self.send("robot", "delete", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn create_user(&self, user: &UserCreate) -> Result<i64, ApiError> {
        let span = info_span!("harbor.user.create", user.name = %user.username);
        async move {
            let request = self.make_request(Method::POST, "/users").json(user);
            let response = self.send("user", "create", request).await?;
            numeric_id_from_location(&response)
        }
        .instrument(span)
        .await
    }

    async fn get_user(&self, id: i64) -> Result<UserRecord, ApiError> {
        let span = info_span!("harbor.user.get", user.id = id);
        async move {
            let request = self.make_request(Method::GET, &format!("/users/{id}"));
            let response = self.send("user", "get", request).await?;
            decode(response).await
        }
        .instrument(span)
        .await
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, ApiError> {
        let span = info_span!("harbor.user.find", user.name = %username);
        async move {
            let query = [("username", username.to_string())];
            let matches: Vec<UserSearchResult> =
                self.list_page("user", "/users/search", &query, 1).await?;
            // Search is fuzzy; only an exact match counts
            let Some(hit) = matches.into_iter().find(|u| u.username == username) else {
                return Ok(None);
            };
            match self.get_user(hit.user_id).await {
                Ok(user) => Ok(Some(user)),
                Err(ApiError::NotFound) => Ok(None),
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    async fn update_user_profile(
        &self,
        id: i64,
        profile: &UserProfileUpdate,
    ) -> Result<(), ApiError> {
        let span = info_span!("harbor.user.update_profile", user.id = id);
        async move {
            let request = self
                .make_request(Method::PUT, &format!("/users/{id}"))
                .json(profile);
            self.send("user", "update_profile", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn set_user_sysadmin(&self, id: i64, sysadmin: bool) -> Result<(), ApiError> {
        let span = info_span!("harbor.user.set_sysadmin", user.id = id, sysadmin = sysadmin);
        async move {
            let request = self
                .make_request(Method::PUT, &format!("/users/{id}/sysadmin"))
                .json(&SysAdminFlag {
                    sysadmin_flag: sysadmin,
                });
            self.send("user", "set_sysadmin", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<(), ApiError> {
        let span = info_span!("harbor.user.delete", user.id = id);
        async move {
            let request = self.make_request(Method::DELETE, &format!("/users/{id}"));
            self.send("user", "delete", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn create_project(&self, project: &ProjectRequest) -> Result<i64, ApiError> {
        let span = info_span!(
            "harbor.project.create",
            project.name = project.project_name.as_deref().unwrap_or_default()
        );
        async move {
            let request = self.make_request(Method::POST, "/projects").json(project);
            let response = self.send("project", "create", request).await?;
            numeric_id_from_location(&response)
        }
        .instrument(span)
        .await
    }

    async fn get_project(&self, id: i64) -> Result<ProjectRecord, ApiError> {
        let span = info_span!("harbor.project.get", project.id = id);
        async move {
            let request = self
                .make_request(Method::GET, &format!("/projects/{id}"))
                .header("X-Is-Resource-Name", "false");
            let response = self.send("project", "get", request).await?;
            decode(response).await
        }
        .instrument(span)
        .await
    }

    async fn find_project(&self, name: &str) -> Result<Option<ProjectRecord>, ApiError> {
        let span = info_span!("harbor.project.find", project.name = %name);
        async move {
            let query = [("name", name.to_string())];
            let projects: Vec<ProjectRecord> =
                self.list_page("project", "/projects", &query, 1).await?;
            Ok(projects.into_iter().find(|p| p.name == name))
        }
        .instrument(span)
        .await
    }

    async fn update_project(&self, id: i64, project: &ProjectRequest) -> Result<(), ApiError> {
        let span = info_span!("harbor.project.update", project.id = id);
        async move {
            let request = self
                .make_request(Method::PUT, &format!("/projects/{id}"))
                .header("X-Is-Resource-Name", "false")
                .json(project);
            self.send("project", "update", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn get_project_storage_limit(&self, id: i64) -> Result<Option<i64>, ApiError> {
        let span = info_span!("harbor.project.get_storage_limit", project.id = id);
        async move {
            Ok(self
                .project_quota(id)
                .await?
                .and_then(|quota| quota.hard.get("storage").copied()))
        }
        .instrument(span)
        .await
    }

    async fn set_project_storage_limit(&self, id: i64, limit: i64) -> Result<(), ApiError> {
        let span = info_span!("harbor.project.set_storage_limit", project.id = id, limit = limit);
        async move {
            let quota = self.project_quota(id).await?.ok_or(ApiError::NotFound)?;
            let request = self
                .make_request(Method::PUT, &format!("/quotas/{}", quota.id))
                .json(&serde_json::json!({ "hard": { "storage": limit } }));
            self.send("project", "set_quota", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn delete_project(&self, id: i64) -> Result<(), ApiError> {
        let span = info_span!("harbor.project.delete", project.id = id);
        async move {
            let request = self
                .make_request(Method::DELETE, &format!("/projects/{id}"))
                .header("X-Is-Resource-Name", "false");
            self.send("project", "delete", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn create_scanner(&self, scanner: &ScannerRequest) -> Result<String, ApiError> {
        let span = info_span!("harbor.scanner.create", scanner.name = %scanner.name);
        async move {
            let request = self.make_request(Method::POST, "/scanners").json(scanner);
            let response = self.send("scanner", "create", request).await?;
            id_from_location(&response)
        }
        .instrument(span)
        .await
    }

    async fn get_scanner(&self, uuid: &str) -> Result<ScannerRecord, ApiError> {
        let span = info_span!("harbor.scanner.get", scanner.uuid = %uuid);
        async move {
            let request = self.make_request(Method::GET, &format!("/scanners/{uuid}"));
            let response = self.send("scanner", "get", request).await?;
            decode(response).await
        }
        .instrument(span)
        .await
    }

    async fn find_scanner(&self, name: &str) -> Result<Option<ScannerRecord>, ApiError> {
        let span = info_span!("harbor.scanner.find", scanner.name = %name);
        async move {
            let query = [("q", format!("name={name}"))];
            let scanners: Vec<ScannerRecord> =
                self.list_page("scanner", "/scanners", &query, 1).await?;
            Ok(scanners.into_iter().find(|s| s.name == name))
        }
        .instrument(span)
        .await
    }

    async fn update_scanner(&self, uuid: &str, scanner: &ScannerRequest) -> Result<(), ApiError> {
        let span = info_span!("harbor.scanner.update", scanner.uuid = %uuid);
        async move {
            let request = self
                .make_request(Method::PUT, &format!("/scanners/{uuid}"))
                .json(scanner);
            self.send("scanner", "update", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn delete_scanner(&self, uuid: &str) -> Result<(), ApiError> {
        let span = info_span!("harbor.scanner.delete", scanner.uuid = %uuid);
        async move {
            let request = self.make_request(Method::DELETE, &format!("/scanners/{uuid}"));
            self.send("scanner", "delete", request).await?;
            Ok(())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> HarborConfig {
        HarborConfig {
            url: url.to_string(),
            username: "admin".to_string(),
            password: Zeroizing::new("secret".to_string()),
            insecure: true,
        }
    }

    #[test]
    fn test_base_url_appends_api_prefix_once() {
        let client = HarborClient::new(&config("https://harbor.example.com/"), Duration::from_secs(5))
            .unwrap();
        assert_eq!(client.base_url, "https://harbor.example.com/api/v2.0");

        let client = HarborClient::new(
            &config("https://harbor.example.com/api/v2.0"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://harbor.example.com/api/v2.0");
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(matches!(
            HarborClient::new(&config("harbor.example.com"), Duration::from_secs(5)),
            Err(ApiError::Transport(_))
        ));
        assert!(matches!(
            HarborClient::new(&config("ftp://harbor.example.com"), Duration::from_secs(5)),
            Err(ApiError::Transport(_))
        ));
    }

    #[test]
    fn test_handle_error_response_parses_harbor_errors() {
        let body = r#"{"errors":[{"code":"CONFLICT","message":"robot already exists"}]}"#;
        assert_eq!(
            handle_error_response(StatusCode::CONFLICT, body),
            ApiError::Conflict("CONFLICT: robot already exists".to_string())
        );
        assert_eq!(
            handle_error_response(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound
        );
        assert!(matches!(
            handle_error_response(StatusCode::FORBIDDEN, "denied"),
            ApiError::Unauthorized { status: 403, .. }
        ));
        assert_eq!(
            handle_error_response(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::Status {
                status: 500,
                message: "boom".to_string()
            }
        );
    }
}
