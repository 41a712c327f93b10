use std::sync::Arc;

use rebar::data::{HasMany, MemoryMapper};
use rebar::model::Schema;
use rebar::rest::Repository;
use rebar::{App, Method, Request, Response, RestConfig, Status};
use serde_json::{Value, json};

async fn app() -> App {
    let orders = Arc::new(MemoryMapper::new(
        Schema::new()
            .property("id", Value::Null)
            .property("user_id", Value::Null)
            .property("total", json!(0))
            .build(),
    ));
    orders.seed([
        json!({ "user_id": 1, "total": 12 }),
        json!({ "user_id": 1, "total": 30 }),
        json!({ "user_id": 2, "total": 5 }),
    ]).await.unwrap();

    let users = MemoryMapper::new(
        Schema::new()
            .property("id", Value::Null)
            .property("name", json!(""))
            .property("email", Value::Null)
            .property("age", json!(0))
            .build(),
    )
    .with_unique("email")
    .with_relation("Orders", Arc::new(HasMany::new(orders, "user_id")));
    users.seed((1..=25).map(|i| json!({
        "name": format!("user{i:02}"),
        "email": format!("user{i:02}@example.com"),
        "age": 17 + i,
    }))).await.unwrap();

    let repository = Repository::new(Arc::new(users))
        .with_config(RestConfig { page_size: 10, max_page_size: 20 });
    App::new().resource("/users", "Users", repository).unwrap()
}

async fn send(app: &App, req: Request) -> (Status, Value) {
    let res: Response = app.handle(req).await;
    let body = if res.body().is_empty() { Value::Null } else { res.json_body().unwrap() };
    (res.status_code(), body)
}

fn get(uri: &str) -> Request {
    Request::new(Method::Get, uri)
}

#[tokio::test]
async fn list_paginates_with_meta() {
    let app = app().await;
    let (status, body) = send(&app, get("/users?page=3")).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["meta"], json!({ "page": 3, "pages": 3, "count": 25 }));
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"][0]["name"], "user21");
}

#[tokio::test]
async fn page_size_is_capped() {
    let app = app().await;
    let (_, body) = send(&app, get("/users?pageSize=500")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 20);
    assert_eq!(body["meta"]["pages"], 2);
}

#[tokio::test]
async fn bad_page_is_unprocessable() {
    let app = app().await;
    let (status, body) = send(&app, get("/users?page=0")).await;
    assert_eq!(status, Status::UnprocessableContent);
    assert_eq!(body["error"]["code"], 422);

    let (status, _) = send(&app, get("/users?page=922337203685477580&pageSize=20")).await;
    assert_eq!(status, Status::UnprocessableContent);
}

#[tokio::test]
async fn filters_and_sorts() {
    let app = app().await;
    let (_, body) = send(&app, get("/users?filter[age][between][]=20&filter[age][between][]=22&order=-age")).await;
    let ages: Vec<&Value> = body["data"].as_array().unwrap().iter().map(|u| &u["age"]).collect();
    assert_eq!(ages, [&json!(22), &json!(21), &json!(20)]);
    assert_eq!(body["meta"]["count"], 3);

    let (_, body) = send(&app, get("/users?filter[name][like]=user1%25&pageSize=20")).await;
    assert_eq!(body["meta"]["count"], 10);

    let (_, body) = send(&app, get("/users?id[in]=2,4,6")).await;
    assert_eq!(body["meta"]["count"], 3);
}

#[tokio::test]
async fn filter_on_unknown_property_is_unprocessable() {
    let app = app().await;
    let (status, _) = send(&app, get("/users?filter[salary][gt]=1")).await;
    assert_eq!(status, Status::UnprocessableContent);

    let (status, _) = send(&app, get("/users?filter[age][near]=1")).await;
    assert_eq!(status, Status::UnprocessableContent);
}

#[tokio::test]
async fn fetch_one() {
    let app = app().await;
    let (status, body) = send(&app, get("/users/4")).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!({ "data": {
        "id": 4, "name": "user04", "email": "user04@example.com", "age": 21,
    }}));

    let (status, body) = send(&app, get("/users/404")).await;
    assert_eq!(status, Status::NotFound);
    assert_eq!(body["error"]["message"], "no record with id 404");
}

#[tokio::test]
async fn create_returns_created() {
    let app = app().await;
    let req = Request::new(Method::Post, "/users")
        .with_json(&json!({ "name": "new", "email": "new@example.com" }));
    let (status, body) = send(&app, req).await;
    assert_eq!(status, Status::Created);
    assert_eq!(body["data"]["id"], 26);
    assert_eq!(body["data"]["age"], 0);

    let (status, _) = send(&app, get("/users/26")).await;
    assert_eq!(status, Status::Ok);

    let req = Request::new(Method::Post, "/users")
        .with_json(&json!({ "id": u64::MAX, "email": "last@example.com" }));
    let (status, body) = send(&app, req).await;
    assert_eq!(status, Status::Created);
    assert_eq!(body["data"]["id"], u64::MAX);
}

#[tokio::test]
async fn create_rejects_bad_bodies() {
    let app = app().await;
    let dup = Request::new(Method::Post, "/users").with_json(&json!({ "email": "user01@example.com" }));
    assert_eq!(send(&app, dup).await.0, Status::Conflict);

    let unknown = Request::new(Method::Post, "/users").with_json(&json!({ "salary": 1 }));
    let (status, body) = send(&app, unknown).await;
    assert_eq!(status, Status::UnprocessableContent);
    assert_eq!(body["error"]["extra"], json!({ "property": "salary" }));

    let garbage = Request::new(Method::Post, "/users").with_body("{not json");
    assert_eq!(send(&app, garbage).await.0, Status::BadRequest);
}

#[tokio::test]
async fn patch_and_put() {
    let app = app().await;
    let patch = Request::new(Method::Patch, "/users/1").with_json(&json!({ "age": 99 }));
    let (status, body) = send(&app, patch).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["name"], "user01");
    assert_eq!(body["data"]["age"], 99);

    let put = Request::new(Method::Put, "/users/1").with_json(&json!({ "id": 7, "name": "renamed" }));
    let (_, body) = send(&app, put).await;
    assert_eq!(body["data"], json!({ "id": 1, "name": "renamed", "email": null, "age": 0 }));

    let (_, body) = send(&app, get("/users/1")).await;
    assert_eq!(body["data"]["name"], "renamed");
    let (status, _) = send(&app, get("/users/7")).await;
    assert_eq!(status, Status::Ok, "user 7 still exists and was not overwritten");
}

#[tokio::test]
async fn delete_then_missing() {
    let app = app().await;
    let (status, body) = send(&app, Request::new(Method::Delete, "/users/3")).await;
    assert_eq!(status, Status::NoContent);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Request::new(Method::Delete, "/users/3")).await;
    assert_eq!(status, Status::NotFound);
}

#[tokio::test]
async fn relation_listing() {
    let app = app().await;
    let (status, body) = send(&app, get("/users/1/orders?order=-total")).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"][0]["total"], 30);
    assert_eq!(body["meta"]["count"], 2);

    let (status, _) = send(&app, get("/users/1/invoices")).await;
    assert_eq!(status, Status::NotFound);

    let (status, _) = send(&app, get("/users/1/orders?filter[email]=x")).await;
    assert_eq!(status, Status::UnprocessableContent);
}

#[tokio::test]
async fn path_shape_errors() {
    let app = app().await;
    assert_eq!(send(&app, get("/users/1/orders/2")).await.0, Status::NotFound);
    assert_eq!(send(&app, Request::new(Method::Post, "/users/1")).await.0, Status::MethodNotAllowed);
    assert_eq!(send(&app, Request::new(Method::Put, "/users")).await.0, Status::MethodNotAllowed);
}
