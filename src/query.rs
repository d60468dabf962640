//! Question Query Service.
//!
//! Every operation borrows the connection it runs on; nothing here holds state
//! between calls. Reads order by id so pages stay stable, and an empty page is
//! reported as [`ApiError::NotFound`] rather than as an empty success.

use std::collections::HashSet;

use diesel::prelude::*;
use diesel::sql_types::{Integer, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::{debug, info, warn};
use rand::Rng;

use crate::error::ApiError;
use crate::models::{Category, CategoryMap, NewQuestion, Question, QuestionPage};
use crate::schema::{categories, questions};

pub const QUESTIONS_PER_PAGE: i64 = 10;

diesel::define_sql_function! {
    /// 1-based position of `needle` in `haystack`, 0 when absent. Case-sensitive.
    fn instr(haystack: Text, needle: Text) -> Integer;
}

/// Which questions a read operation works over, before pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WorkingSet {
    All,
    InCategory(i32),
    Containing(String),
}

impl WorkingSet {
    fn query(&self) -> questions::BoxedQuery<'static, Sqlite> {
        let query = questions::table.into_boxed();
        match self {
            WorkingSet::All => query,
            WorkingSet::InCategory(id) => query.filter(questions::category.eq(*id)),
            WorkingSet::Containing(term) => {
                query.filter(instr(questions::question, term.clone()).gt(0))
            }
        }
    }
}

/// Row offset of the first question on a 1-indexed page, `None` for pages before the first.
pub fn page_offset(page: i64) -> Option<i64> {
    if page < 1 {
        return None;
    }
    (page - 1).checked_mul(QUESTIONS_PER_PAGE)
}

/// All categories, id to label.
pub fn categories(conn: &mut SqliteConnection) -> QueryResult<CategoryMap> {
    let rows: Vec<Category> = categories::table
        .order(categories::id.asc())
        .select(Category::as_select())
        .load(conn)?;
    Ok(rows.into_iter().map(|c| (c.id, c.kind)).collect())
}

fn find_category(conn: &mut SqliteConnection, id: i32) -> QueryResult<Option<Category>> {
    categories::table
        .find(id)
        .select(Category::as_select())
        .first(conn)
        .optional()
}

fn page_of(
    conn: &mut SqliteConnection,
    working_set: WorkingSet,
    page: i64,
    current_category: Option<Category>,
) -> Result<QuestionPage, ApiError> {
    let offset = page_offset(page).ok_or(ApiError::NotFound)?;

    let total: i64 = working_set.query().count().get_result(conn)?;
    let questions: Vec<Question> = working_set
        .query()
        .order(questions::id.asc())
        .limit(QUESTIONS_PER_PAGE)
        .offset(offset)
        .select(Question::as_select())
        .load(conn)?;

    if questions.is_empty() {
        debug!("Page {} of {:?} is empty", page, working_set);
        return Err(ApiError::NotFound);
    }

    Ok(QuestionPage {
        success: true,
        questions,
        total_questions: total as usize,
        categories: categories(conn)?,
        current_category,
    })
}

/// One page of questions, optionally restricted to a category.
pub fn list(
    conn: &mut SqliteConnection,
    category_id: Option<i32>,
    page: i64,
) -> Result<QuestionPage, ApiError> {
    match category_id {
        None => page_of(conn, WorkingSet::All, page, None),
        Some(id) => {
            let category = find_category(conn, id)?.ok_or_else(|| {
                debug!("No category with id {}", id);
                ApiError::NotFound
            })?;
            page_of(conn, WorkingSet::InCategory(id), page, Some(category))
        }
    }
}

/// First page of the questions whose text contains `term`, matching case.
pub fn search(conn: &mut SqliteConnection, term: &str) -> Result<QuestionPage, ApiError> {
    page_of(conn, WorkingSet::Containing(term.to_owned()), 1, None)
}

/// Stores a new question and answers with the first unfiltered page.
pub fn create(conn: &mut SqliteConnection, question: &NewQuestion) -> Result<QuestionPage, ApiError> {
    conn.transaction(|conn| {
        diesel::insert_into(questions::table)
            .values(question)
            .execute(conn)
    })
    .map_err(|e| ApiError::from(e).into_bad_request())?;
    info!("Created question {:?}", question.question);

    list(conn, None, 1)
}

pub fn delete(conn: &mut SqliteConnection, question_id: i32) -> Result<(), ApiError> {
    conn.transaction(|conn| {
        let removed = diesel::delete(questions::table.find(question_id)).execute(conn)?;
        if removed == 0 {
            warn!("Refusing to delete missing question {}", question_id);
            return Err(ApiError::BadRequest);
        }
        Ok(())
    })
    .map_err(ApiError::into_bad_request)?;
    info!("Deleted question {}", question_id);
    Ok(())
}

/// Draws a question the player has not seen yet. `None` means the quiz is over.
///
/// A category id that does not name a stored category (0 included) plays
/// across all categories.
pub fn select_quiz_question<R: Rng + ?Sized>(
    conn: &mut SqliteConnection,
    category_id: Option<i32>,
    previous_questions: &[i32],
    rng: &mut R,
) -> Result<Option<Question>, ApiError> {
    let category = match category_id {
        Some(id) => find_category(conn, id)?,
        None => None,
    };
    let working_set = match category {
        Some(category) => WorkingSet::InCategory(category.id),
        None => WorkingSet::All,
    };

    let mut candidates: Vec<Question> = working_set
        .query()
        .order(questions::id.asc())
        .select(Question::as_select())
        .load(conn)?;
    // Filtered here: one bind per asked id would hit SQLite's variable limit.
    let asked: HashSet<i32> = previous_questions.iter().copied().collect();
    candidates.retain(|q| !asked.contains(&q.id));

    if candidates.is_empty() {
        debug!("No questions left in {:?}", working_set);
        return Ok(None);
    }
    let index = rng.gen_range(0..candidates.len());
    Ok(Some(candidates.swap_remove(index)))
}
