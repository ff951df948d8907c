//! Behavioural tests for the `applyEdits` feature encoding.

use std::cell::RefCell;

use incident_core::test_support::{fixed_clock, raw_incident};
use incident_core::{FeatureRecord, Gazetteer, IncidentRecord, RawIncident};
use incident_data::arcgis::FeaturePayload;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;

#[derive(Default)]
struct PayloadWorld {
    raw: RefCell<Option<RawIncident>>,
    gazetteer: RefCell<Gazetteer>,
    encoded: RefCell<Option<Value>>,
}

impl PayloadWorld {
    fn encoded(&self) -> Value {
        self.encoded
            .borrow()
            .clone()
            .unwrap_or_else(|| panic!("payload must be encoded first"))
    }
}

#[fixture]
fn world() -> PayloadWorld {
    PayloadWorld::default()
}

// --- Given steps ---

#[given("a validated incident UKR1 in Kyiv City")]
fn incident_in_kyiv(#[from(world)] world: &PayloadWorld) {
    *world.raw.borrow_mut() = Some(raw_incident("UKR1"));
}

#[given("a validated incident UKR2 without a timestamp")]
fn incident_without_timestamp(#[from(world)] world: &PayloadWorld) {
    let mut raw = raw_incident("UKR2");
    raw.timestamp = None;
    *world.raw.borrow_mut() = Some(raw);
}

#[given("a gazetteer mapping Kyiv City to Kyiv")]
fn kyiv_gazetteer(#[from(world)] world: &PayloadWorld) {
    *world.gazetteer.borrow_mut() = Gazetteer::from_pairs([("Kyiv City", "Kyiv")]);
}

#[given("an empty gazetteer")]
fn empty_gazetteer(#[from(world)] world: &PayloadWorld) {
    *world.gazetteer.borrow_mut() = Gazetteer::default();
}

// --- When steps ---

#[when("I encode it for applyEdits")]
fn encode(#[from(world)] world: &PayloadWorld) {
    let raw = world
        .raw
        .borrow_mut()
        .take()
        .unwrap_or_else(|| panic!("incident must be initialised"));
    let incident = IncidentRecord::try_from(raw)
        .unwrap_or_else(|err| panic!("incident should validate: {err}"));
    let feature = FeatureRecord::assemble(incident, &world.gazetteer.borrow(), fixed_clock());
    let json = serde_json::to_value(FeaturePayload::from(&feature))
        .unwrap_or_else(|err| panic!("payload should serialise: {err}"));
    *world.encoded.borrow_mut() = Some(json);
}

// --- Then steps ---

#[then("the admin1 attribute is Kyiv")]
fn admin1_is_kyiv(#[from(world)] world: &PayloadWorld) {
    assert_eq!(world.encoded()["attributes"]["admin1"], "Kyiv");
}

#[then("the geometry is a WGS84 point at the incident coordinates")]
fn geometry_matches(#[from(world)] world: &PayloadWorld) {
    let geometry = world.encoded()["geometry"].clone();
    assert_eq!(geometry["x"], 30.5233);
    assert_eq!(geometry["y"], 50.45);
    assert_eq!(geometry["spatialReference"]["wkid"], 4326);
}

#[then("the provenance and status attributes are fixed")]
fn provenance_fixed(#[from(world)] world: &PayloadWorld) {
    let attributes = world.encoded()["attributes"].clone();
    assert_eq!(
        attributes["source_deteails"],
        "Armed Conflict Location & Event Data Project (ACLED); acleddata.com"
    );
    assert_eq!(attributes["status"], "external_acled");
}

#[then("the received time attribute is null")]
fn received_time_null(#[from(world)] world: &PayloadWorld) {
    assert_eq!(world.encoded()["attributes"]["recevied_time"], Value::Null);
}

// --- Scenario registrations ---

#[scenario(path = "tests/features/feature_payload.feature", index = 0)]
fn encoding_validated_incident(world: PayloadWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/feature_payload.feature", index = 1)]
fn encoding_without_timestamp(world: PayloadWorld) {
    let _ = world;
}
