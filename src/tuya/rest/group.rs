use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    color::DeviceHsv,
    error::{Error, Result},
    protocols::https::{mk_get_request, mk_post_request, HyperHttpsClient},
    settings::Settings,
    status::{codes, find_status, StatusEntry, StatusValue},
};

use super::common::TuyaResponse;

#[derive(Builder, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[builder(setter(into, strip_option), default)]
pub struct Group {
    #[serde(rename = "group_id")]
    pub id: String,
    #[serde(rename = "group_name")]
    pub name: String,
    #[serde(rename = "device_num", default)]
    pub member_count: u32,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub status: Vec<StatusEntry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Group {
    pub fn is_on(&self) -> bool {
        find_status(&self.status, codes::SWITCH_LED)
            .and_then(StatusValue::as_bool)
            .unwrap_or(false)
    }

    pub fn brightness(&self) -> i64 {
        find_status(&self.status, codes::BRIGHT_VALUE)
            .and_then(StatusValue::as_integer)
            .unwrap_or(1000)
    }

    pub fn work_mode(&self) -> &str {
        find_status(&self.status, codes::WORK_MODE)
            .and_then(StatusValue::as_str)
            .unwrap_or("white")
    }

    /// Current colour, preferring the packed status value over the
    /// `colour_data_v2` property.
    pub fn color(&self) -> DeviceHsv {
        let from_status = find_status(&self.status, codes::COLOUR_DATA)
            .and_then(StatusValue::as_str)
            .and_then(|hex| DeviceHsv::from_hex(hex).ok());

        let from_properties = || {
            self.properties
                .get(codes::COLOUR_DATA_V2)
                .and_then(|v| serde_json::from_value::<DeviceHsv>(v.clone()).ok())
        };

        from_status
            .or_else(from_properties)
            .unwrap_or(DeviceHsv::new(0, 0, 1000))
    }
}

#[derive(Deserialize, Debug, Clone)]
struct GroupsPage {
    list: Vec<Group>,
    #[serde(default)]
    total: usize,
}

/// Status-set entries come back with string encoded values and a declared
/// type, e.g. `{"code": "switch_led", "value": "true", "type": "bool"}`.
#[derive(Deserialize, Debug, Clone)]
struct GroupStatusItem {
    code: String,
    value: Value,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl GroupStatusItem {
    fn into_status_entry(self) -> StatusEntry {
        let GroupStatusItem { code, value, kind } = self;

        let value = match (kind.as_deref(), value) {
            (Some("bool"), Value::String(s)) => StatusValue::Bool(s == "true"),
            (Some("value"), Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => StatusValue::Integer(i),
                Err(_) => StatusValue::Text(s),
            },
            (_, value) => {
                serde_json::from_value(value.clone()).unwrap_or(StatusValue::Other(value))
            }
        };

        StatusEntry { code, value }
    }
}

#[derive(Serialize, Debug, Clone)]
struct PropertiesRequest {
    /// JSON object encoded as a string, as the vendor API expects
    properties: String,
}

async fn get_groups_page(
    settings: &Settings,
    client: &HyperHttpsClient,
    page_no: u32,
) -> Result<GroupsPage> {
    let path = format!(
        "/groups?page_no={}&page_size={}&space_id={}",
        page_no, settings.backend.page_size, settings.backend.space_id
    );

    let response: TuyaResponse<GroupsPage> = mk_get_request(client, settings, &path).await?;
    response.into_result("GET", &path)
}

/// Fetches every page of groups in the configured space.
pub async fn get_groups(settings: &Settings, client: &HyperHttpsClient) -> Result<Vec<Group>> {
    let mut groups = vec![];
    let mut page_no = 1;

    loop {
        let page = get_groups_page(settings, client, page_no)
            .await
            .inspect_err(|e| log::error!("Error while fetching groups page {page_no}: {e}"))?;

        let fetched = page.list.len();
        groups.extend(page.list);

        if fetched == 0 || groups.len() >= page.total {
            break;
        }

        page_no += 1;
    }

    Ok(groups)
}

pub async fn get_group_status(
    settings: &Settings,
    client: &HyperHttpsClient,
    group_id: &str,
) -> Result<Vec<StatusEntry>> {
    let path = format!("/groups/{group_id}/status");
    let response: TuyaResponse<Vec<GroupStatusItem>> = mk_get_request(client, settings, &path)
        .await
        .inspect_err(|e| log::error!("Error while fetching status of group {group_id}: {e}"))?;

    Ok(response
        .into_result("GET", &path)?
        .into_iter()
        .map(GroupStatusItem::into_status_entry)
        .collect())
}

pub async fn get_group_properties(
    settings: &Settings,
    client: &HyperHttpsClient,
    group_id: &str,
) -> Result<Map<String, Value>> {
    let path = format!("/groups/{group_id}/properties");
    let response: TuyaResponse<Value> = mk_get_request(client, settings, &path)
        .await
        .inspect_err(|e| log::error!("Error while fetching properties of group {group_id}: {e}"))?;

    match response.check("GET", &path)? {
        Some(Value::Object(mut map)) => {
            // Same string encoding as the write path
            if let Some(Value::String(encoded)) = map.get("properties") {
                if let Ok(Value::Object(inner)) = serde_json::from_str::<Value>(encoded) {
                    return Ok(inner);
                }
            }
            map.remove("properties");
            Ok(map)
        }
        None | Some(Value::Null) => Ok(Map::new()),
        Some(other) => Err(Error::transport(
            "GET",
            &path,
            None,
            format!("expected a properties object, got {other}"),
        )),
    }
}

pub fn encode_properties(properties: &[StatusEntry]) -> Result<String> {
    let map = properties
        .iter()
        .map(|p| {
            serde_json::to_value(&p.value)
                .map(|value| (p.code.clone(), value))
                .map_err(|e| Error::invalid_value(&p.code, e.to_string()))
        })
        .collect::<Result<Map<String, Value>>>()?;

    Ok(Value::Object(map).to_string())
}

pub async fn post_group_properties(
    settings: &Settings,
    client: &HyperHttpsClient,
    group_id: &str,
    properties: &[StatusEntry],
) -> Result<()> {
    let path = format!("/groups/{group_id}/properties");

    let result = async {
        let body = PropertiesRequest {
            properties: encode_properties(properties)?,
        };
        let response: TuyaResponse<Value> = mk_post_request(client, settings, &path, &body).await?;
        response.check("POST", &path)
    }
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!(
                "Error while setting properties of group {group_id}: {e}\n{:#?}",
                properties
            );
            Err(e)
        }
    }
}
