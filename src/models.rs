use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::*;

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = applications)]
pub struct Application {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub folder_path: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = applications)]
pub struct NewApplication {
    pub id: String,
    pub name: String,
    pub api_key: String,
    pub folder_path: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = files)]
#[diesel(belongs_to(Application))]
pub struct FileRecord {
    pub id: String,
    pub application_id: String,
    pub original_name: String,
    pub current_name: String,
    pub file_path: String,
    pub file_type: String,
    pub size: i64,
    pub is_public: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = files)]
pub struct NewFileRecord {
    pub id: String,
    pub application_id: String,
    pub original_name: String,
    pub current_name: String,
    pub file_path: String,
    pub file_type: String,
    pub size: i64,
    pub is_public: bool,
}
