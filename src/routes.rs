//! HTTP surface of the trivia game. Handlers only parse requests and pick an
//! operation; the work happens in [`crate::query`] on a pooled connection.

use std::num::IntErrorKind;
use std::path::Path;

use actix_files::Files;
use actix_web::{
    http::Method,
    middleware::DefaultHeaders,
    web::{self, Data},
    HttpRequest, HttpResponse,
};
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use serde::de::{self, Deserializer};
use serde_derive::Deserialize;

use crate::error::ApiError;
use crate::models::{CategoryList, Deleted, NewQuestion, QuizQuestion};
use crate::query;
use crate::store::DbPool;

const ALLOW_HEADERS: &str = "Content-Type,Authorization,true";
const ALLOW_METHODS: &str = "GET,PATCH,POST,DELETE,OPTIONS";

/// `?page=` as the client sent it. Anything that is not an integer means page 1;
/// integers too large to hold are pages past the end.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        let raw = match self.page.as_deref() {
            Some(raw) => raw.trim(),
            None => return 1,
        };
        match raw.parse::<i64>() {
            Ok(page) => page,
            Err(e) => match e.kind() {
                IntErrorKind::PosOverflow => i64::MAX,
                IntErrorKind::NegOverflow => i64::MIN,
                _ => 1,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i32),
    Str(String),
}

/// Ids arrive as numbers or as numeric strings, depending on the client.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
    match <Option<IntOrString> as serde::Deserialize>::deserialize(deserializer)? {
        None => Ok(None),
        Some(IntOrString::Int(id)) => Ok(Some(id)),
        Some(IntOrString::Str(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
    }
}

/// Body of `POST /questions`, which both creates and searches.
#[derive(Deserialize, Debug, Default)]
pub struct QuestionsPayload {
    #[serde(rename = "searchTerm")]
    search_term: Option<String>,
    question: Option<String>,
    answer: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    category: Option<i32>,
    #[serde(default, deserialize_with = "lenient_id")]
    difficulty: Option<i32>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum QuestionsRequest {
    Search(String),
    Create(NewQuestion),
}

impl TryFrom<QuestionsPayload> for QuestionsRequest {
    type Error = ApiError;

    fn try_from(payload: QuestionsPayload) -> Result<Self, Self::Error> {
        let QuestionsPayload {
            search_term,
            question,
            answer,
            category,
            difficulty,
        } = payload;
        if let Some(term) = search_term {
            return Ok(QuestionsRequest::Search(term));
        }
        match (question, answer, category, difficulty) {
            (Some(question), Some(answer), Some(category), Some(difficulty)) => {
                Ok(QuestionsRequest::Create(NewQuestion {
                    question,
                    answer,
                    category,
                    difficulty,
                }))
            }
            incomplete => {
                debug!("Incomplete question payload: {:?}", incomplete);
                Err(ApiError::BadRequest)
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct QuizCategory {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<i32>,
}

#[derive(Deserialize, Debug, Default)]
pub struct QuizPayload {
    previous_questions: Option<Vec<i32>>,
    quiz_category: Option<QuizCategory>,
}

/// Runs `op` on the blocking pool with a connection that is returned to the
/// pool as soon as `op` finishes.
async fn with_connection<T, F>(pool: &Data<DbPool>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    web::block(move || {
        let mut conn = pool.get()?;
        op(&mut conn)
    })
    .await?
}

pub async fn get_categories(pool: Data<DbPool>) -> Result<HttpResponse, ApiError> {
    let categories = with_connection(&pool, |conn| Ok(query::categories(conn)?)).await?;
    Ok(HttpResponse::Ok().json(CategoryList { categories }))
}

pub async fn get_questions(
    pool: Data<DbPool>,
    params: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = params.page();
    let listing = with_connection(&pool, move |conn| query::list(conn, None, page)).await?;
    Ok(HttpResponse::Ok().json(listing))
}

pub async fn get_category_questions(
    pool: Data<DbPool>,
    category_id: web::Path<i32>,
    params: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let category_id = category_id.into_inner();
    let page = params.page();
    let listing =
        with_connection(&pool, move |conn| query::list(conn, Some(category_id), page)).await?;
    Ok(HttpResponse::Ok().json(listing))
}

pub async fn post_questions(
    pool: Data<DbPool>,
    payload: web::Json<QuestionsPayload>,
) -> Result<HttpResponse, ApiError> {
    let listing = match QuestionsRequest::try_from(payload.into_inner())? {
        QuestionsRequest::Search(term) => {
            with_connection(&pool, move |conn| query::search(conn, &term)).await?
        }
        QuestionsRequest::Create(question) => {
            with_connection(&pool, move |conn| query::create(conn, &question)).await?
        }
    };
    Ok(HttpResponse::Ok().json(listing))
}

pub async fn delete_question(
    pool: Data<DbPool>,
    question_id: web::Path<i32>,
) -> Result<HttpResponse, ApiError> {
    let question_id = question_id.into_inner();
    with_connection(&pool, move |conn| query::delete(conn, question_id)).await?;
    Ok(HttpResponse::Ok().json(Deleted { success: true }))
}

pub async fn post_quizzes(
    pool: Data<DbPool>,
    payload: web::Json<QuizPayload>,
) -> Result<HttpResponse, ApiError> {
    let QuizPayload {
        previous_questions,
        quiz_category,
    } = payload.into_inner();
    let previous = previous_questions.unwrap_or_default();
    let category_id = quiz_category.and_then(|c| c.id);

    let question = with_connection(&pool, move |conn| {
        query::select_quiz_question(conn, category_id, &previous, &mut rand::thread_rng())
    })
    .await?;
    Ok(HttpResponse::Ok().json(QuizQuestion { question }))
}

/// Preflight requests are answered anywhere; everything else unmatched is a 404.
pub async fn not_found(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    if *req.method() == Method::OPTIONS {
        return Ok(HttpResponse::NoContent().finish());
    }
    debug!("No route for {} {}", req.method(), req.path());
    Err(ApiError::NotFound)
}

async fn method_not_allowed(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    if *req.method() == Method::OPTIONS {
        return Ok(HttpResponse::NoContent().finish());
    }
    Err(ApiError::MethodNotAllowed)
}

/// Headers that let a frontend served from elsewhere call the API.
pub fn cors() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Headers", ALLOW_HEADERS))
        .add(("Access-Control-Allow-Methods", ALLOW_METHODS))
}

/// Serves a built frontend from `dir`. Register after [`configure`].
pub fn frontend(dir: &Path) -> Files {
    Files::new("/", dir).index_file("index.html")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Malformed JSON body: {}", err);
        ApiError::BadRequest.into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        debug!("Unparseable path: {}", err);
        ApiError::NotFound.into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        warn!("Malformed query string: {}", err);
        ApiError::BadRequest.into()
    }))
    .service(
        web::resource("/categories")
            .route(web::get().to(get_categories))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/categories/{category_id}/questions")
            .route(web::get().to(get_category_questions))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/questions")
            .route(web::get().to(get_questions))
            .route(web::post().to(post_questions))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/questions/{question_id}")
            .route(web::delete().to(delete_question))
            .default_service(web::to(method_not_allowed)),
    )
    .service(
        web::resource("/quizzes")
            .route(web::post().to(post_quizzes))
            .default_service(web::to(method_not_allowed)),
    )
    .default_service(web::to(not_found));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<QuestionsRequest, ApiError> {
        let payload: QuestionsPayload = serde_json::from_value(body).unwrap();
        QuestionsRequest::try_from(payload)
    }

    #[test]
    fn search_term_wins_over_question_fields() {
        let request = parse(json!({
            "searchTerm": "title",
            "question": "Q",
            "answer": "A",
            "category": 1,
            "difficulty": 1
        }))
        .unwrap();
        assert_eq!(request, QuestionsRequest::Search("title".to_owned()));
    }

    #[test]
    fn null_search_term_means_create() {
        let request = parse(json!({
            "searchTerm": null,
            "question": "To be or not to be?",
            "answer": "To be",
            "category": "6",
            "difficulty": 1
        }))
        .unwrap();
        assert_eq!(
            request,
            QuestionsRequest::Create(NewQuestion {
                question: "To be or not to be?".to_owned(),
                answer: "To be".to_owned(),
                category: 6,
                difficulty: 1,
            })
        );
    }

    #[test]
    fn missing_fields_are_bad_requests() {
        assert!(matches!(
            parse(json!({"question": "Q", "answer": "A", "category": 1})),
            Err(ApiError::BadRequest)
        ));
        assert!(matches!(parse(json!({})), Err(ApiError::BadRequest)));
    }

    #[test]
    fn ids_must_be_numeric() {
        let result: Result<QuestionsPayload, _> =
            serde_json::from_value(json!({"question": "Q", "category": "sports"}));
        assert!(result.is_err());
    }

    #[test]
    fn page_falls_back_to_first() {
        let page = |raw: Option<&str>| {
            PageQuery {
                page: raw.map(str::to_owned),
            }
            .page()
        };
        assert_eq!(page(None), 1);
        assert_eq!(page(Some("3")), 3);
        assert_eq!(page(Some("three")), 1);
        assert_eq!(page(Some("-2")), -2);
        assert_eq!(page(Some("99999999999999999999")), i64::MAX);
        assert_eq!(page(Some("-99999999999999999999")), i64::MIN);
        assert_eq!(page(Some("")), 1);
    }

    #[test]
    fn quiz_payload_defaults() {
        let payload: QuizPayload = serde_json::from_value(json!({})).unwrap();
        assert!(payload.previous_questions.is_none());
        assert!(payload.quiz_category.is_none());

        let payload: QuizPayload = serde_json::from_value(json!({
            "previous_questions": [1, 2],
            "quiz_category": {"type": "click", "id": "0"}
        }))
        .unwrap();
        assert_eq!(payload.previous_questions, Some(vec![1, 2]));
        assert_eq!(payload.quiz_category.unwrap().id, Some(0));
    }
}
