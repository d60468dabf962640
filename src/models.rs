use std::collections::BTreeMap;

use diesel::{Insertable, Queryable, Selectable};
use serde_derive::{Deserialize, Serialize};

use crate::schema::{categories, questions};

/// A stored trivia question. Serializes to the shape clients see.
#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = questions)]
pub struct Question {
    pub id: i32,
    pub question: String,
    pub answer: String,
    pub difficulty: i32,
    pub category: i32,
}

#[derive(Insertable, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = questions)]
pub struct NewQuestion {
    pub question: String,
    pub answer: String,
    pub category: i32,
    pub difficulty: i32,
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = categories)]
pub struct NewCategory<'a> {
    pub kind: &'a str,
}

/// Category id to display label, ordered by id.
pub type CategoryMap = BTreeMap<i32, String>;

/// One page of questions together with everything a client needs to render it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QuestionPage {
    pub success: bool,
    pub questions: Vec<Question>,
    pub total_questions: usize,
    pub categories: CategoryMap,
    pub current_category: Option<Category>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryList {
    pub categories: CategoryMap,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: Option<Question>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub success: bool,
}
