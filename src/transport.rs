use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SyncError;
use crate::orders::{Order, OrderPayload};
use crate::remote::{
    Associate, Category, Envelope, Remote, Session, SubmitMode,
    SubmitOutcome, Unit,
};
use crate::rows::{Cell, RawRow};
use crate::tax::TaxDefinition;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// First sheet row carrying data; row 1 is the header.
const FIRST_DATA_ROW: u32 = 2;

/// Column span of one row and the column holding the billed flag.
const ROW_SPAN: &str = "A{row}:J";
const BILLED_COLUMN: &str = "H";

/// Blocking HTTP implementation of the [`Remote`] collaborators: the
/// spreadsheet service on a bearer token, the accounting service on basic
/// auth. Token acquisition happens out of band; the session carries the
/// result.
pub struct HttpRemote<'a> {
    http: Client,
    session: &'a Session,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Cell>>,
}

impl<'a> HttpRemote<'a> {
    pub fn new(session: &'a Session) -> Result<Self, SyncError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SyncError::transport("client", e))?;
        Ok(Self { http, session })
    }

    fn cashctrl_url(&self, endpoint: &str) -> String {
        format!(
            "https://{}.cashctrl.com/api/v1{}",
            self.session.domain, endpoint
        )
    }

    fn cashctrl_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, SyncError> {
        let response = self
            .http
            .get(self.cashctrl_url(endpoint))
            .basic_auth(&self.session.api_key, Some(""))
            .query(query)
            .send()
            .map_err(|e| SyncError::transport(endpoint, e))?;
        Self::parse(endpoint, response)
    }

    fn cashctrl_post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: &[(String, String)],
    ) -> Result<T, SyncError> {
        let response = self
            .http
            .post(self.cashctrl_url(endpoint))
            .basic_auth(&self.session.api_key, Some(""))
            .form(form)
            .send()
            .map_err(|e| SyncError::transport(endpoint, e))?;
        Self::parse(endpoint, response)
    }

    fn sheets_get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, SyncError> {
        self.session.ensure_fresh()?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.session.sheet_token)
            .query(query)
            .send()
            .map_err(|e| SyncError::transport(url, e))?;
        Self::parse(url, response)
    }

    fn parse<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::blocking::Response,
    ) -> Result<T, SyncError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SyncError::transport(
                endpoint,
                format!("status {}: {}", status, body),
            ));
        }
        response
            .json()
            .map_err(|e| SyncError::transport(endpoint, e))
    }

    fn list<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>, SyncError> {
        let envelope: Envelope<Vec<T>> = self.cashctrl_get(endpoint, &[])?;
        Ok(envelope.data)
    }
}

/// Flattens a payload into the form fields the accounting API expects.
fn form_fields(payload: &OrderPayload) -> Result<Vec<(String, String)>, SyncError> {
    let value = serde_json::to_value(payload)?;
    let Value::Object(map) = value else {
        return Ok(Vec::new());
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

impl Remote for HttpRemote<'_> {
    fn fetch_rows(&mut self) -> Result<Vec<RawRow>, SyncError> {
        let range = format!(
            "{}!{}",
            self.session.sheet_name,
            ROW_SPAN.replace("{row}", &FIRST_DATA_ROW.to_string()),
        );
        let url = format!(
            "{}/{}/values/{}",
            SHEETS_BASE, self.session.spreadsheet_id, range
        );
        let range: ValueRange = self
            .sheets_get(&url, &[("valueRenderOption", "UNFORMATTED_VALUE")])?;

        Ok(range
            .values
            .into_iter()
            .enumerate()
            .map(|(offset, cells)| RawRow {
                index: FIRST_DATA_ROW + offset as u32,
                cells,
            })
            .collect())
    }

    fn list_taxes(&mut self) -> Result<Vec<TaxDefinition>, SyncError> {
        self.list("/tax/list.json")
    }

    fn list_units(&mut self) -> Result<Vec<Unit>, SyncError> {
        self.list("/inventory/unit/list.json")
    }

    fn list_associates(&mut self) -> Result<Vec<Associate>, SyncError> {
        self.list("/person/list.json")
    }

    fn list_categories(&mut self) -> Result<Vec<Category>, SyncError> {
        self.list("/order/category/list.json")
    }

    fn fetch_order(&mut self, id: i64) -> Result<Order, SyncError> {
        let envelope: Envelope<Order> = self
            .cashctrl_get("/order/read.json", &[("id", id.to_string())])?;
        Ok(envelope.data)
    }

    fn submit_order(
        &mut self,
        payload: &OrderPayload,
        mode: SubmitMode,
    ) -> Result<SubmitOutcome, SyncError> {
        let endpoint = match mode {
            SubmitMode::Create => "/order/create.json",
            SubmitMode::Update => "/order/update.json",
        };
        self.cashctrl_post(endpoint, &form_fields(payload)?)
    }

    fn flag_rows_billed(&mut self, rows: &[u32]) -> Result<(), SyncError> {
        if rows.is_empty() {
            return Ok(());
        }
        self.session.ensure_fresh()?;

        let data: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "range": format!(
                        "{}!{}{}",
                        self.session.sheet_name, BILLED_COLUMN, row
                    ),
                    "values": [[true]],
                })
            })
            .collect();
        let body = json!({
            "valueInputOption": "USER_ENTERED",
            "data": data,
        });

        let url = format!(
            "{}/{}/values:batchUpdate",
            SHEETS_BASE, self.session.spreadsheet_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.session.sheet_token)
            .json(&body)
            .send()
            .map_err(|e| SyncError::transport(&url, e))?;
        let _: Value = Self::parse(&url, response)?;
        Ok(())
    }
}
