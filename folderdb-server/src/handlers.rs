use actix_multipart::{Multipart, MultipartError};
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use folderdb::{Filter, FolderDbError, LoginRequest, RegisterRequest, Store};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/json")
            // Fixed sub-paths first so they are not captured as ids
            .route("/{collection}/search", web::get().to(search))
            .route("/{collection}/complex-search", web::post().to(complex_search))
            .route("/{collection}", web::get().to(list_documents))
            .route("/{collection}", web::put().to(create_document))
            .route("/{collection}/{id}", web::get().to(get_document))
            .route("/{collection}/{id}", web::post().to(update_document))
            .route("/{collection}/{id}", web::delete().to(delete_document)),
    )
    .service(
        web::scope("/images")
            .route("", web::post().to(upload_image))
            .route("/{id}", web::get().to(get_image)),
    )
    .service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/register", web::post().to(register)),
    );
}

// ── Helpers ─────────────────────────────────────────────────────────

fn ok_json(value: Value) -> HttpResponse {
    HttpResponse::Ok().json(value)
}

fn created_json(location: String, value: Value) -> HttpResponse {
    HttpResponse::Created()
        .insert_header((header::LOCATION, location))
        .json(value)
}

fn err_response(e: FolderDbError) -> HttpResponse {
    let body = json!({ "error": e.to_string() });
    match &e {
        FolderDbError::NotFound { .. } => HttpResponse::NotFound().json(body),
        FolderDbError::InvalidCredentials => HttpResponse::Unauthorized().json(body),
        e if e.is_client_error() => HttpResponse::BadRequest().json(body),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Run a store call on the blocking thread pool.
async fn blocking<T, F>(state: &web::Data<AppState>, f: F) -> folderdb::Result<T>
where
    F: FnOnce(&Store) -> folderdb::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    web::block(move || f(&state.store))
        .await
        .map_err(|e| FolderDbError::Other(format!("blocking task failed: {e}")))?
}

fn body_text(body: web::Bytes) -> Result<String, FolderDbError> {
    String::from_utf8(body.to_vec())
        .map_err(|_| FolderDbError::InvalidContent("request body is not UTF-8".into()))
}

// ── Documents ───────────────────────────────────────────────────────

async fn list_documents(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let collection = path.into_inner();
    match blocking(&state, move |store| store.collection(&collection)?.list()).await {
        Ok(docs) => ok_json(Value::Array(docs)),
        Err(e) => err_response(e),
    }
}

async fn get_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    match blocking(&state, move |store| store.collection(&collection)?.get(&id)).await {
        Ok(bytes) => HttpResponse::Ok()
            .content_type(header::ContentType::json())
            .body(bytes),
        Err(e) => err_response(e),
    }
}

async fn create_document(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Bytes,
) -> HttpResponse {
    let collection = path.into_inner();
    let content = match body_text(body) {
        Ok(content) => content,
        Err(e) => return err_response(e),
    };

    let name = collection.clone();
    match blocking(&state, move |store| store.collection(&name)?.insert(&content)).await {
        Ok(id) => created_json(
            format!("/json/{collection}/{id}"),
            json!({ "id": id, "message": format!("File created: {collection}/{id}.json") }),
        ),
        Err(e) => err_response(e),
    }
}

async fn update_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Bytes,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    let content = match body_text(body) {
        Ok(content) => content,
        Err(e) => return err_response(e),
    };

    let message = format!("File updated: {collection}/{id}.json");
    match blocking(&state, move |store| store.collection(&collection)?.update(&id, &content)).await {
        Ok(()) => ok_json(json!({ "message": message })),
        Err(e) => err_response(e),
    }
}

async fn delete_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (collection, id) = path.into_inner();
    let message = format!("File deleted: {collection}/{id}.json");
    match blocking(&state, move |store| store.collection(&collection)?.delete(&id)).await {
        Ok(()) => ok_json(json!({ "message": message })),
        Err(e) => err_response(e),
    }
}

// ── Search ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: String,
}

async fn search(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<SearchQuery>,
) -> HttpResponse {
    let collection = path.into_inner();
    let SearchQuery { field, value } = query.into_inner();
    match blocking(&state, move |store| {
        store.collection(&collection)?.search(&field, &value)
    })
    .await
    {
        Ok(docs) => ok_json(Value::Array(docs)),
        Err(e) => err_response(e),
    }
}

#[derive(Deserialize)]
struct ComplexSearchRequest {
    #[serde(default)]
    filters: Vec<Filter>,
}

async fn complex_search(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ComplexSearchRequest>,
) -> HttpResponse {
    let collection = path.into_inner();
    let filters = body.into_inner().filters;
    match blocking(&state, move |store| {
        store.collection(&collection)?.complex_search(&filters)
    })
    .await
    {
        Ok(docs) => ok_json(Value::Array(docs)),
        Err(e) => err_response(e),
    }
}

// ── Images ──────────────────────────────────────────────────────────

async fn get_image(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    match blocking(&state, move |store| store.assets().retrieve(&id)).await {
        Ok(asset) => HttpResponse::Ok()
            .content_type(asset.mime_type)
            .body(asset.bytes),
        Err(e) => err_response(e),
    }
}

#[derive(Deserialize)]
struct UploadQuery {
    id: Option<String>,
}

/// The `file` part of a multipart upload.
struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

async fn read_upload(payload: &mut Multipart) -> Result<Option<Upload>, MultipartError> {
    while let Some(mut field) = payload.try_next().await? {
        let (name, file_name) = {
            let disposition = field.content_disposition();
            (
                disposition.get_name().map(str::to_string),
                disposition.get_filename().map(str::to_string),
            )
        };
        if name.as_deref() != Some("file") {
            continue;
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }
        return Ok(Some(Upload {
            file_name: file_name.unwrap_or_default(),
            bytes,
        }));
    }
    Ok(None)
}

async fn upload_image(
    state: web::Data<AppState>,
    query: web::Query<UploadQuery>,
    mut payload: Multipart,
) -> HttpResponse {
    let upload = match read_upload(&mut payload).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return err_response(FolderDbError::EmptyFile),
        Err(e) => {
            return HttpResponse::BadRequest().json(json!({ "error": format!("Invalid upload: {e}") }))
        }
    };

    let id = query.into_inner().id;
    match blocking(&state, move |store| {
        store
            .assets()
            .store(id.as_deref(), &upload.bytes, &upload.file_name)
    })
    .await
    {
        Ok(id) => created_json(
            format!("/images/{id}"),
            json!({ "id": id, "message": format!("Image saved: {id}") }),
        ),
        Err(e) => err_response(e),
    }
}

// ── Auth ────────────────────────────────────────────────────────────

async fn login(state: web::Data<AppState>, body: web::Json<LoginRequest>) -> HttpResponse {
    let request = body.into_inner();
    match blocking(&state, move |store| store.credentials().login(&request)).await {
        Ok(response) => HttpResponse::Ok().json(response),
        // Missing fields are reported as a failed login too.
        Err(FolderDbError::MissingParameter(_)) => err_response(FolderDbError::InvalidCredentials),
        Err(e) => err_response(e),
    }
}

async fn register(state: web::Data<AppState>, body: web::Json<RegisterRequest>) -> HttpResponse {
    let request = body.into_inner();
    match blocking(&state, move |store| store.credentials().register(&request)).await {
        Ok(response) => created_json(format!("/json/user/{}", response.id), json!(response)),
        Err(e) => err_response(e),
    }
}
