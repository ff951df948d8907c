//! Response envelope of the ACLED read endpoint.
//!
//! A successful read carries `data` and `count`. Failures can arrive with a
//! 200 status and `"success": false`, with `error` holding either a message
//! string, an object with a `message`, or a list of such objects.

use incident_core::{IncidentPage, RawIncident};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ReadResponse {
    pub(crate) success: Option<bool>,
    pub(crate) error: Option<Value>,
    pub(crate) count: Option<u64>,
    pub(crate) data: Vec<RawIncident>,
}

impl ReadResponse {
    /// The API-level error message, if the envelope reports a failure.
    pub(crate) fn failure(&self) -> Option<String> {
        match (&self.error, self.success) {
            (Some(error), _) => Some(error_message(error)),
            (None, Some(false)) => Some("request was not successful".to_owned()),
            (None, _) => None,
        }
    }

    pub(crate) fn into_page(self) -> IncidentPage {
        let page = IncidentPage::new(self.data);
        match self.count.and_then(|count| usize::try_from(count).ok()) {
            Some(count) => page.with_count(count),
            None => page,
        }
    }
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned),
        Value::Array(errors) => errors
            .iter()
            .map(error_message)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use incident_core::test_support::{MemoryFeatureStore, ScriptedSource, raw_incident};
    use incident_core::{Gazetteer, IncidentQuery, RunReporter, SyncEngine};
    use rstest::rstest;
    use serde_json::json;

    fn parse(json: &str) -> ReadResponse {
        serde_json::from_str(json).expect("valid envelope")
    }

    #[rstest]
    fn successful_read_keeps_reported_count() {
        let response = parse(
            r#"{"status": 200, "success": true, "count": 2,
                "data": [{"event_id_cnty": "UKR1"}, {"event_id_cnty": "UKR2"}]}"#,
        );

        assert_eq!(response.failure(), None);
        let page = response.into_page();
        assert_eq!(page.count, 2);
        assert_eq!(page.records.len(), 2);
    }

    #[rstest]
    fn missing_count_falls_back_to_data_length() {
        let page = parse(r#"{"data": [{"event_id_cnty": "UKR1"}]}"#).into_page();
        assert_eq!(page.count, 1);
    }

    #[rstest]
    fn unexpected_value_types_stay_within_their_record() {
        let response = parse(
            r#"{"success": true, "count": 3, "data": [
                {"event_id_cnty": "UKR1"},
                {"event_id_cnty": "UKR2", "tags": ["a", "b"]},
                {"event_id_cnty": "UKR3", "notes": {"text": "x"}}
            ]}"#,
        );

        let page = response.into_page();
        assert_eq!(page.records.len(), 3);
    }

    #[rstest]
    fn mixed_type_page_syncs_the_valid_records() {
        let mut records: Vec<Value> = ["UKR1", "UKR2", "UKR3"]
            .into_iter()
            .map(|id| serde_json::to_value(raw_incident(id)).expect("raw incident json"))
            .collect();
        let tagged = records.get_mut(1).expect("second record");
        tagged["tags"] = json!(["a"]);
        tagged["latitude"] = json!(50.45);
        let body = json!({"success": true, "count": 3, "data": records});
        let response: ReadResponse = serde_json::from_value(body).expect("valid envelope");

        let source = ScriptedSource::new(vec![response.into_page()]);
        let mut engine = SyncEngine::new(source, MemoryFeatureStore::default(), Gazetteer::default());
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        let mut reporter = RunReporter::new(Vec::new());
        let state = engine
            .run(&IncidentQuery::new("Ukraine", day, day), &mut reporter)
            .expect("run should succeed");

        assert_eq!(state.summary.processed, 3);
        assert_eq!(state.summary.added, 2);
        assert_eq!(state.summary.rejected, 1);
        assert_eq!(engine.store().inserted_identifiers(), ["UKR1", "UKR3"]);
    }

    #[rstest]
    #[case(r#"{"success": false, "error": "Access denied"}"#, "Access denied")]
    #[case(
        r#"{"success": false, "error": {"status": 403, "message": "Invalid key"}}"#,
        "Invalid key"
    )]
    #[case(
        r#"{"error": [{"message": "bad country"}, {"message": "bad year"}]}"#,
        "bad country; bad year"
    )]
    #[case(r#"{"success": false}"#, "request was not successful")]
    fn failures_surface_their_message(#[case] json: &str, #[case] expected: &str) {
        assert_eq!(parse(json).failure().as_deref(), Some(expected));
    }
}
