//! activeCollab source, spoken over its `api.php` endpoint with JSON output.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::config::AccountConfig;
use crate::error::{Error, Result};
use crate::types::{Project, ProjectId, Ticket};

use super::{AdapterError, ExternalSource, TimerRecord};

pub struct ActiveCollabSource {
    client: Client,
    endpoint: String,
    token: String,
}

pub(super) fn build(account: &AccountConfig, url: &str, token: &str) -> Result<Box<dyn ExternalSource>> {
    let source = ActiveCollabSource::new(url, token, Duration::from_secs(account.timeout))?;
    Ok(Box::new(source))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn value(&self) -> Option<i64> {
        match self {
            RawId::Number(id) => Some(*id),
            RawId::Text(raw) => raw.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize)]
struct ProjectItem {
    id: RawId,
    name: String,
}

#[derive(Deserialize)]
struct TicketItem {
    id: RawId,
    ticket_id: RawId,
    name: String,
}

impl ActiveCollabSource {
    /// `url` is the site host (`projects.example.com`) or a full base URL.
    pub fn new(url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("qtimer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::Configuration(format!("cannot build HTTP client: {err}")))?;
        Ok(Self {
            client,
            endpoint: endpoint_for(url),
            token: token.to_string(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("token", self.token.as_str()), ("path_info", path), ("format", "json")])
            .send()
            .map_err(|source| AdapterError::Http {
                path: path.to_string(),
                source,
            })?;
        let body = check_status(path, response)?
            .text()
            .map_err(|source| AdapterError::Http {
                path: path.to_string(),
                source,
            })?;
        decode(path, &body)
    }
}

impl ExternalSource for ActiveCollabSource {
    fn name(&self) -> &str {
        "activecollab"
    }

    fn list_projects(&self) -> Result<Vec<Project>, AdapterError> {
        let items: Vec<ProjectItem> = self.get("projects")?;
        items
            .into_iter()
            .map(|item| {
                let id = item.id.value().ok_or_else(|| AdapterError::Decode {
                    path: "projects".into(),
                    message: format!("project '{}' has no numeric id", item.name),
                })?;
                Ok(Project {
                    id,
                    name: item.name,
                })
            })
            .collect()
    }

    fn list_tickets(&self, project_id: ProjectId) -> Result<Vec<Ticket>, AdapterError> {
        if project_id < 0 {
            return Err(AdapterError::InvalidRequest(format!(
                "invalid project id {project_id}"
            )));
        }
        let path = format!("projects/{project_id}/tickets");
        let items: Vec<TicketItem> = self.get(&path)?;
        items
            .into_iter()
            .map(|item| {
                let (Some(id), Some(ticket_id)) = (item.id.value(), item.ticket_id.value()) else {
                    return Err(AdapterError::Decode {
                        path: path.clone(),
                        message: format!("ticket '{}' has no numeric id", item.name),
                    });
                };
                Ok(Ticket {
                    id,
                    ticket_id,
                    name: item.name,
                    project_id,
                })
            })
            .collect()
    }

    fn post_timer(
        &self,
        project_id: ProjectId,
        ticket_id: i64,
        record: &TimerRecord,
    ) -> Result<(), AdapterError> {
        if project_id < 0 {
            return Err(AdapterError::InvalidRequest(format!(
                "invalid project id {project_id}"
            )));
        }
        if ticket_id < 0 {
            return Err(AdapterError::InvalidRequest(format!(
                "invalid ticket id {ticket_id}"
            )));
        }
        let path = format!("projects/{project_id}/time/add");
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("token", self.token.as_str()), ("path_info", path.as_str()), ("format", "json")])
            .form(&time_form(ticket_id, record))
            .send()
            .map_err(|source| AdapterError::Http {
                path: path.clone(),
                source,
            })?;
        check_status(&path, response)?;
        Ok(())
    }
}

fn endpoint_for(url: &str) -> String {
    let base = url.trim().trim_end_matches('/');
    let base = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_string()
    } else {
        format!("https://{base}")
    };
    format!("{base}/api.php")
}

fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, AdapterError> {
    serde_json::from_str(body).map_err(|source| AdapterError::Json {
        path: path.to_string(),
        source,
    })
}

fn check_status(path: &str, response: Response) -> Result<Response, AdapterError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(AdapterError::Status {
            path: path.to_string(),
            status: status.as_u16(),
        })
    }
}

fn time_form(ticket_id: i64, record: &TimerRecord) -> Vec<(&'static str, String)> {
    let mut form = vec![
        ("submitted", "submitted".to_string()),
        ("time[value]", format!("{:.2}", record.hours())),
        ("time[record_date]", record.start.format("%Y-%m-%d").to_string()),
        ("time[body]", record.name.clone()),
        ("time[parent_id]", ticket_id.to_string()),
    ];
    if let Some(status) = record.billable_status {
        form.push(("time[billable_status]", status.code().to_string()));
    }
    form
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    use super::*;
    use crate::types::BillableStatus;

    fn source(server: &mockito::Server) -> ActiveCollabSource {
        ActiveCollabSource::new(&server.url(), "1-token", Duration::from_secs(5)).unwrap()
    }

    fn api_query(path: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("token".into(), "1-token".into()),
            Matcher::UrlEncoded("path_info".into(), path.into()),
            Matcher::UrlEncoded("format".into(), "json".into()),
        ])
    }

    #[test]
    fn endpoint_accepts_bare_hosts_and_full_urls() {
        assert_eq!(endpoint_for("ac.example.com"), "https://ac.example.com/api.php");
        assert_eq!(endpoint_for("http://localhost:8080/"), "http://localhost:8080/api.php");
    }

    #[test]
    fn lists_projects() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/api.php")
            .match_query(api_query("projects"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 4, "name": "Website"}, {"id": "7", "name": "Backend"}]"#)
            .create();

        let projects = source(&server).list_projects().unwrap();

        mock.assert();
        assert_eq!(
            projects,
            vec![
                Project { id: 4, name: "Website".into() },
                Project { id: 7, name: "Backend".into() },
            ]
        );
    }

    #[test]
    fn tickets_are_tagged_with_their_project() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api.php")
            .match_query(api_query("projects/4/tickets"))
            .with_status(200)
            .with_body(r#"[{"id": 120, "ticket_id": 3, "name": "Header", "permalink": "x"}]"#)
            .create();

        let tickets = source(&server).list_tickets(4).unwrap();
        assert_eq!(
            tickets,
            vec![Ticket {
                id: 120,
                ticket_id: 3,
                name: "Header".into(),
                project_id: 4,
            }]
        );
    }

    #[test]
    fn http_errors_become_status_errors() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api.php")
            .match_query(Matcher::Any)
            .with_status(403)
            .create();

        let err = source(&server).list_projects().unwrap_err();
        assert!(matches!(err, AdapterError::Status { status: 403, .. }));
        assert!(!err.to_string().contains("1-token"));
    }

    #[test]
    fn malformed_bodies_keep_the_json_error() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/api.php")
            .match_query(api_query("projects"))
            .with_status(200)
            .with_body("<projects/>")
            .create();

        let err = source(&server).list_projects().unwrap_err();
        assert!(matches!(err, AdapterError::Json { ref path, .. } if path == "projects"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn posts_time_record_as_form() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api.php")
            .match_query(api_query("projects/4/time/add"))
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("time[value]".into(), "1.50".into()),
                Matcher::UrlEncoded("time[parent_id]".into(), "3".into()),
                Matcher::UrlEncoded("time[record_date]".into(), "2024-04-02".into()),
                Matcher::UrlEncoded("time[billable_status]".into(), "1".into()),
            ]))
            .with_status(200)
            .create();

        let record = TimerRecord {
            timer_id: 9,
            name: "Header layout".into(),
            ticket_id: 3,
            start: Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap(),
            duration: chrono::Duration::minutes(90),
            billable_status: Some(BillableStatus::NonBillable),
        };
        source(&server).post_timer(4, 3, &record).unwrap();
        mock.assert();
    }

    #[test]
    fn rejects_negative_ids_before_sending() {
        let server = mockito::Server::new();
        let record = TimerRecord {
            timer_id: 1,
            name: "x".into(),
            ticket_id: 1,
            start: Utc::now(),
            duration: chrono::Duration::zero(),
            billable_status: None,
        };
        let err = source(&server).post_timer(-1, 1, &record).unwrap_err();
        assert!(matches!(err, AdapterError::InvalidRequest(_)));
    }
}
