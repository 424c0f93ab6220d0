mod common;

use chrono::{TimeZone, Utc};
use common::MockTransport;
use oarc_core::{
    Args, Client, ClientOptions, HttpMethod, HttpResponse, InvokeError, NameMode, Record,
    RequestOptions, Server, Value, parse,
};
use serde_json::json;

const ITEMS: &str = include_str!("fixtures/items.yaml");
const PETS: &str = include_str!("fixtures/pets.yaml");

fn items_client() -> (Client, MockTransport) {
    let transport = MockTransport::new();
    let client = Client::from_yaml(ITEMS, transport.clone()).expect("items client should build");
    (client, transport)
}

fn pets_client() -> (Client, MockTransport) {
    let transport = MockTransport::new();
    let client = Client::from_yaml(PETS, transport.clone()).expect("pets client should build");
    (client, transport)
}

fn args<const N: usize>(pairs: [(&str, Value); N]) -> Args {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[test]
fn get_item_end_to_end() {
    let (client, transport) = items_client();
    transport.respond_json(200, json!({"Value": 1, "Label": "x"}));

    let item = client
        .invoke("getItem", &args([("id", Value::from(42))]))
        .unwrap()
        .expect("body should decode");

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.url, "https://items.test/api/items/42");

    let item = item.as_record().expect("should decode to a record");
    assert_eq!(item.type_name(), "Item");
    assert_eq!(item.get("value").and_then(Value::as_i64), Some(1));
    assert_eq!(item.get("label").and_then(Value::as_str), Some("x"));
    assert!(item.get("note").is_none());
}

#[test]
fn untagged_operation_is_callable_from_root() {
    let (client, transport) = items_client();
    transport.respond_json(200, json!({"Value": 5}));
    let item = client.call("get_item", &args([("id", Value::from(5))])).unwrap();
    assert!(item.is_some());
    assert!(client.call("list_items", &Args::new()).is_err());
}

#[test]
fn missing_path_parameter_is_rejected_before_sending() {
    let (client, transport) = items_client();
    let err = client.invoke("getItem", &Args::new()).unwrap_err();
    assert!(matches!(err, InvokeError::MissingRequiredParameter(ref name) if name == "id"));
    assert_eq!(err.to_string(), "'id' is required");
    assert!(transport.requests().is_empty());
}

#[test]
fn null_argument_counts_as_missing() {
    let (client, _transport) = items_client();
    let err = client
        .invoke("getItem", &args([("id", Value::Null)]))
        .unwrap_err();
    assert!(matches!(err, InvokeError::MissingRequiredParameter(_)));
}

#[test]
fn query_and_header_parameters() {
    let (client, transport) = items_client();
    transport.respond_json(200, json!([{"Value": 1}, {"Value": 2, "Label": "b"}]));

    let items = client
        .namespace("items")
        .unwrap()
        .call(
            "list_items",
            &args([
                ("limit", Value::from(5)),
                ("labels", Value::from(vec!["red", "blue"])),
                ("x_request_id", Value::from("req-1")),
            ]),
        )
        .unwrap()
        .unwrap();

    let request = transport.last_request();
    assert_eq!(
        request.full_url(),
        "https://items.test/api/items?limit=5&labels=red&labels=blue"
    );
    assert_eq!(request.header("x-request-id"), Some("req-1"));

    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(
        items[1].as_record().unwrap().get("label").and_then(Value::as_str),
        Some("b")
    );
}

#[test]
fn optional_parameters_are_skipped() {
    let (client, transport) = items_client();
    transport.respond_json(200, json!([]));
    client.invoke("listItems", &Args::new()).unwrap();
    let request = transport.last_request();
    assert!(request.query.is_empty());
    assert!(request.headers.is_empty());
}

#[test]
fn option_precedence() {
    let transport = MockTransport::new();
    let document = parse::from_yaml(ITEMS).unwrap();
    let options = ClientOptions {
        defaults: RequestOptions::default()
            .header("Authorization", "Bearer default")
            .query("limit", "100")
            .query("lang", "en"),
        ..ClientOptions::default()
    };
    let client = Client::build_with_options(&document, transport.clone(), options).unwrap();
    transport.respond_json(200, json!([]));

    client
        .invoke_with(
            "listItems",
            &args([("limit", Value::from(3))]),
            &RequestOptions::default()
                .header("authorization", "Bearer call")
                .query("lang", "fr"),
        )
        .unwrap();

    let request = transport.last_request();
    assert_eq!(request.query_value("limit"), Some("3"));
    assert_eq!(request.query_value("lang"), Some("fr"));
    assert_eq!(request.header("Authorization"), Some("Bearer call"));
    assert_eq!(request.headers.len(), 1);
}

#[test]
fn request_body_is_serialized_with_wire_names() {
    let (client, transport) = items_client();
    transport.respond_json(201, json!({"Value": 9, "Label": "new"}));
    let item_id = client.registry().id_of("Item").unwrap();

    let created = client
        .invoke(
            "createItem",
            &args([(
                "body",
                Record::new(item_id, "Item")
                    .with("value", 9)
                    .with("label", "new")
                    .into(),
            )]),
        )
        .unwrap()
        .unwrap();

    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(
        request.body,
        Some(json!({"Value": 9, "Label": "new", "Note": null}))
    );
    assert_eq!(created.as_record().unwrap().record_id(), item_id);
}

#[test]
fn error_status_carries_json_body() {
    let (client, transport) = items_client();
    transport.respond_json(404, json!({"code": 404, "message": "no such item"}));
    let err = client
        .invoke("getItem", &args([("id", Value::from(1))]))
        .unwrap_err();
    match err {
        InvokeError::Status {
            status,
            message,
            body,
        } => {
            assert_eq!(status, 404);
            assert!(message.contains("no such item"));
            assert_eq!(body.unwrap()["code"], json!(404));
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[test]
fn default_response_decodes_non_listed_status() {
    let (client, transport) = items_client();
    transport.respond_json(202, json!({"code": 1, "message": "queued"}));
    let value = client
        .invoke("createItem", &args([("body", Value::from(json!({"Value": 1})))]))
        .unwrap()
        .unwrap();
    assert_eq!(value.as_record().unwrap().type_name(), "Error");
}

#[test]
fn empty_body_yields_none() {
    let (client, transport) = items_client();
    transport.respond(HttpResponse::new(204));
    let result = client
        .invoke(
            "deleteItem",
            &args([("id", Value::from(3)), ("session", Value::from("s1"))]),
        )
        .unwrap();
    assert!(result.is_none());
    let request = transport.last_request();
    assert_eq!(request.method, HttpMethod::Delete);
    assert_eq!(request.cookie_header().as_deref(), Some("session=s1"));
}

#[test]
fn body_without_content_length_is_empty() {
    let (client, transport) = items_client();
    transport.respond(HttpResponse::new(200).with_body(r#"{"Value": 4}"#));
    let item = client
        .invoke("getItem", &args([("id", Value::from(4))]))
        .unwrap();
    assert!(item.is_none());
}

#[test]
fn undeclared_status_returns_raw_json() {
    let (client, transport) = items_client();
    transport.respond_json(203, json!({"anything": [1, 2]}));
    let value = client
        .invoke("getItem", &args([("id", Value::from(4))]))
        .unwrap()
        .unwrap();
    assert!(value.as_object().is_some());
}

#[test]
fn invalid_json_body_is_an_error() {
    let (client, transport) = items_client();
    transport.respond(
        HttpResponse::new(200)
            .with_header("content-length", "8")
            .with_body("not json"),
    );
    let err = client
        .invoke("getItem", &args([("id", Value::from(4))]))
        .unwrap_err();
    assert!(matches!(err, InvokeError::InvalidJson(_)));
}

#[test]
fn server_variables_and_override() {
    let (mut client, transport) = pets_client();
    assert_eq!(client.server().url(), "https://api.pets.test/v3");

    client.set_server(Server::new("http://localhost:3000/"));
    transport.respond_json(200, json!({"petType": "a", "name": "Tom"}));
    client
        .invoke("getPetById", &args([("pet_id", Value::from("p 1"))]))
        .unwrap();
    assert_eq!(transport.last_request().url, "http://localhost:3000/pets/p%201");
}

#[test]
fn configured_server_variables_apply() {
    let transport = MockTransport::new();
    let document = parse::from_yaml(PETS).unwrap();
    let mut options = ClientOptions::default();
    options
        .server_variables
        .insert("env".to_string(), "staging".to_string());
    let client = Client::build_with_options(&document, transport, options).unwrap();
    assert_eq!(client.server().url(), "https://staging.pets.test/v3");
}

#[test]
fn union_response_dispatches_on_tag() {
    let (client, transport) = pets_client();
    let pets = client.namespace("pet_store").expect("pet_store namespace");
    let cat_id = client.registry().id_of("Cat").unwrap();
    let dog_id = client.registry().id_of("Dog").unwrap();

    transport.respond_json(200, json!({"petType": "a", "name": "Tom"}));
    let cat = pets
        .call("get_pet_by_id", &args([("pet_id", Value::from("1"))]))
        .unwrap()
        .unwrap();
    let cat = cat.as_record().unwrap();
    assert_eq!(cat.record_id(), cat_id);
    assert_eq!(cat.get("lives_left").and_then(Value::as_i64), Some(9));

    transport.respond_json(200, json!({"petType": "b", "name": "Rex", "nickName": null}));
    let dog = pets
        .call("get_pet_by_id", &args([("pet_id", Value::from("2"))]))
        .unwrap()
        .unwrap();
    assert_eq!(dog.as_record().unwrap().record_id(), dog_id);

    transport.respond_json(200, json!({"petType": "c"}));
    let err = pets
        .call("get_pet_by_id", &args([("pet_id", Value::from("3"))]))
        .unwrap_err();
    assert!(err.to_string().contains("`c`"));

    transport.respond_json(200, json!({"name": "ghost"}));
    let err = pets
        .call("get_pet_by_id", &args([("pet_id", Value::from("4"))]))
        .unwrap_err();
    assert!(err.to_string().contains("petType"));
}

#[test]
fn union_body_must_be_a_member() {
    let (client, transport) = pets_client();
    let owner_id = client.registry().id_of("Owner").unwrap();
    let err = client
        .invoke(
            "addPet",
            &args([("body", Record::new(owner_id, "Owner").with("name", "Ann").into())]),
        )
        .unwrap_err();
    assert!(matches!(err, InvokeError::Codec(_)));
    assert!(transport.requests().is_empty());
}

#[test]
fn nested_records_and_datetimes() {
    let (client, transport) = pets_client();
    transport.respond_json(
        200,
        json!({
            "name": "Ann",
            "registeredAt": "2023-01-01T00:00:00Z",
            "pets": [{"petType": "b", "name": "Rex"}],
            "household": {"address": "1 Main St", "members": [{"name": "Bo"}]},
        }),
    );
    let owner = client
        .namespace("owners")
        .unwrap()
        .call("get_owner", &args([("owner_id", Value::from(7))]))
        .unwrap()
        .unwrap();
    assert_eq!(transport.last_request().url, "https://api.pets.test/v3/owners/7");

    let owner = owner.as_record().unwrap();
    assert_eq!(
        owner.get("registered_at").and_then(Value::as_datetime),
        Some(&Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap().fixed_offset())
    );
    let pet = &owner.get("pets").and_then(Value::as_array).unwrap()[0];
    assert_eq!(pet.as_record().unwrap().type_name(), "Dog");

    let household = owner.get("household").and_then(Value::as_record).unwrap();
    assert_eq!(household.type_name(), "Household");
    let member = &household.get("members").and_then(Value::as_array).unwrap()[0];
    assert_eq!(member.as_record().unwrap().type_name(), "Owner");
}

#[test]
fn round_trip_through_codec() {
    let (client, _transport) = pets_client();
    let codec = client.codec();
    let owner_id = client.registry().id_of("Owner").unwrap();
    let dog_id = client.registry().id_of("Dog").unwrap();
    let owner: Value = Record::new(owner_id, "Owner")
        .with("name", "Ann")
        .with(
            "registered_at",
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap(),
        )
        .with(
            "pets",
            vec![Value::from(
                Record::new(dog_id, "Dog")
                    .with("pet_type", "b")
                    .with("name", "Rex"),
            )],
        )
        .into();
    let ty = oarc_core::TypeDescriptor::Named(owner_id);

    let wire = codec.serialize(&owner, &ty).unwrap();
    assert_eq!(wire["registeredAt"], json!("2024-02-29T12:00:00Z"));
    assert!(wire.get("household").is_none());
    assert_eq!(wire["pets"][0]["nickName"], json!(null));

    assert_eq!(codec.deserialize(&wire, &ty).unwrap(), owner);
}

#[test]
fn local_name_mode_reads_snake_case_payloads() {
    let transport = MockTransport::new();
    let document = parse::from_yaml(ITEMS).unwrap();
    let options = ClientOptions {
        name_mode: NameMode::Local,
        ..ClientOptions::default()
    };
    let client = Client::build_with_options(&document, transport.clone(), options).unwrap();
    transport.respond_json(200, json!({"value": 2, "label": "snake"}));
    let item = client
        .invoke("getItem", &args([("id", Value::from(2))]))
        .unwrap()
        .unwrap();
    assert_eq!(
        item.as_record().unwrap().get("label").and_then(Value::as_str),
        Some("snake")
    );
}
