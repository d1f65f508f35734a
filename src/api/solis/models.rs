use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::core::cid::Cid;

#[derive(Serialize)]
pub struct ReadRequest<'a> {
    #[serde(rename = "inverterSn")]
    pub serial_number: &'a str,

    pub cid: Cid,
}

#[derive(Serialize)]
pub struct ReadBatchRequest<'a> {
    #[serde(rename = "inverterSn")]
    pub serial_number: &'a str,

    /// Comma-joined CIDs.
    pub cids: String,
}

#[derive(Serialize)]
pub struct ControlRequest<'a> {
    #[serde(rename = "inverterSn")]
    pub serial_number: &'a str,

    pub cid: Cid,

    pub value: &'a str,

    /// Previous value hint.
    #[serde(rename = "yuanzhi", skip_serializing_if = "Option::is_none")]
    pub old_value: Option<&'a str>,
}

#[derive(Serialize)]
pub struct InverterListRequest {
    #[serde(rename = "pageSize")]
    pub page_size: &'static str,
}

#[derive(Serialize)]
pub struct InverterDetailsRequest<'a> {
    #[serde(rename = "sn")]
    pub serial_number: &'a str,
}

/// `data` of a single read.
#[derive(Deserialize)]
pub struct ReadData {
    #[serde(default, deserialize_with = "string_or_number")]
    pub msg: Option<String>,
}

/// One `{cid, msg}` item of a batch read.
#[serde_as]
#[derive(Deserialize)]
pub struct BatchItem {
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub cid: Option<i32>,

    #[serde(default, deserialize_with = "string_or_number")]
    pub msg: Option<String>,
}

/// Per-command status returned by the control endpoint.
#[derive(Deserialize)]
pub struct ControlStatus {
    #[serde(default, deserialize_with = "string_or_number")]
    pub code: Option<String>,

    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Deserialize)]
pub struct InverterListData {
    pub page: InverterListPage,
}

#[derive(Deserialize)]
pub struct InverterListPage {
    pub records: Vec<InverterRecord>,
}

#[must_use]
#[derive(Clone, Debug, Deserialize)]
pub struct InverterRecord {
    #[serde(rename = "sn")]
    pub serial_number: String,

    #[serde(default, rename = "stationName")]
    pub station_name: Option<String>,

    #[serde(default, deserialize_with = "string_or_number")]
    pub model: Option<String>,

    #[serde(default, deserialize_with = "string_or_number")]
    pub machine: Option<String>,

    /// `1` when online.
    #[serde(default, deserialize_with = "string_or_number")]
    pub state: Option<String>,
}

/// Fields of the inverter detail endpoint used to pick the register map.
///
/// The provider mixes numbers and strings, so everything is kept as a string.
#[must_use]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InverterDetails {
    #[serde(default, deserialize_with = "string_or_number")]
    pub model: Option<String>,

    #[serde(default, deserialize_with = "string_or_number")]
    pub version: Option<String>,

    #[serde(default, deserialize_with = "string_or_number")]
    pub machine: Option<String>,

    #[serde(default, rename = "energyStorageControl", deserialize_with = "string_or_number")]
    pub energy_storage_control: Option<String>,

    #[serde(default, deserialize_with = "string_or_number")]
    pub power: Option<String>,

    #[serde(default, rename = "powerStr", deserialize_with = "string_or_number")]
    pub power_unit: Option<String>,

    #[serde(default, rename = "parallelNumber", deserialize_with = "string_or_number")]
    pub parallel_number: Option<String>,

    #[serde(default, rename = "parallelBattery", deserialize_with = "string_or_number")]
    pub parallel_battery: Option<String>,
}

/// Accept a JSON string, number, or boolean as an optional string.
pub fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(string)) => Some(string),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn batch_item_numeric_cid_ok() {
        let item: BatchItem = serde_json::from_value(json!({"cid": -1, "msg": "a"})).unwrap();
        assert_eq!(item.cid, Some(-1));
        assert_eq!(item.msg.as_deref(), Some("a"));
    }

    #[test]
    fn batch_item_string_cid_ok() {
        let item: BatchItem = serde_json::from_value(json!({"cid": "636", "msg": "35"})).unwrap();
        assert_eq!(item.cid, Some(636));
    }

    #[test]
    fn batch_item_missing_fields_ok() {
        let item: BatchItem = serde_json::from_value(json!({})).unwrap();
        assert!(item.cid.is_none());
        assert!(item.msg.is_none());
    }

    #[test]
    fn control_request_without_hint() {
        let request = ControlRequest { serial_number: "sn", cid: Cid(636), value: "35", old_value: None };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"inverterSn":"sn","cid":636,"value":"35"}"#,
        );
    }

    #[test]
    fn control_request_with_hint() {
        let request =
            ControlRequest { serial_number: "sn", cid: Cid(636), value: "35", old_value: Some("33") };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"inverterSn":"sn","cid":636,"value":"35","yuanzhi":"33"}"#,
        );
    }

    #[test]
    fn inverter_details_mixed_types_ok() {
        // language=json
        let body = r#"{
            "model": "3331",
            "version": "3B0021",
            "machine": "S6-EH1P",
            "energyStorageControl": "1",
            "power": 6.0,
            "powerStr": "kW",
            "parallelNumber": 1,
            "parallelBattery": null,
            "stationName": "Home"
        }"#;
        let details: InverterDetails = serde_json::from_str(body).unwrap();
        assert_eq!(details.model.as_deref(), Some("3331"));
        assert_eq!(details.energy_storage_control.as_deref(), Some("1"));
        assert_eq!(details.power.as_deref(), Some("6.0"));
        assert_eq!(details.parallel_number.as_deref(), Some("1"));
        assert!(details.parallel_battery.is_none());
    }
}
