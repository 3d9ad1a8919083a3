//! User profile management

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::database::Database;
use super::{contains_ci, finish_csv, is_unique_violation, StoreError};
use crate::validation::{parse_age, Field, FormInput, ValidationError, Validator, AGE_RANGE};

const ENTITY: &str = "User";

pub const CSV_HEADER: [&str; 7] = [
    "Name",
    "Email",
    "Age",
    "Phone",
    "Address",
    "Gender",
    "Education",
];

const SELECT_USERS: &str = "
    SELECT id, name, email, age, phone, address, gender, education, created_at
    FROM users";

/// Most recent first; id breaks ties between rows created in the same instant
const ORDER_USERS: &str = "ORDER BY created_at DESC, id DESC";

/// Stored user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub phone: String,
    pub address: String,
    pub gender: String,
    pub education: String,
    pub created_at: DateTime<Utc>,
}

/// Profile fields supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProfile {
    pub name: String,
    pub email: String,
    pub age: u32,
    pub phone: String,
    pub address: String,
    pub gender: String,
    pub education: String,
}

impl NewProfile {
    /// Validate raw form fields in display order and build the profile
    pub fn from_form(form: &FormInput, validator: &Validator) -> Result<Self, ValidationError> {
        validator.check_profile_form(form)?;
        let age = parse_age(form.get("age")).ok_or_else(|| ValidationError::new(Field::Age))?;

        Ok(Self {
            name: form.trimmed("name"),
            email: form.trimmed("email"),
            age,
            phone: form.trimmed("phone"),
            address: form.trimmed("address"),
            gender: form.trimmed("gender"),
            education: form.trimmed("education"),
        })
    }

    /// The same rules as the form, applied again at the store boundary
    pub fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
        validator.validate(Field::Name, &self.name)?;
        validator.validate(Field::Email, &self.email)?;
        if !AGE_RANGE.contains(&self.age) {
            return Err(ValidationError::new(Field::Age));
        }
        validator.validate(Field::Phone, &self.phone)?;
        validator.validate(Field::Address, &self.address)?;
        validator.validate(Field::Gender, &self.gender)?;
        validator.validate(Field::Education, &self.education)?;
        Ok(())
    }

    fn normalized(mut self) -> Self {
        for value in [
            &mut self.name,
            &mut self.email,
            &mut self.phone,
            &mut self.address,
            &mut self.gender,
            &mut self.education,
        ] {
            *value = value.trim().to_string();
        }
        self
    }
}

/// Which profile fields a search term is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileSearchScope {
    /// Name or email
    #[default]
    All,
    Name,
    Email,
}

impl ProfileSearchScope {
    fn matches(&self, profile: &UserProfile, needle: &str) -> bool {
        match self {
            ProfileSearchScope::All => {
                contains_ci(&profile.name, needle) || contains_ci(&profile.email, needle)
            }
            ProfileSearchScope::Name => contains_ci(&profile.name, needle),
            ProfileSearchScope::Email => contains_ci(&profile.email, needle),
        }
    }
}

impl FromStr for ProfileSearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "name" => Ok(Self::Name),
            "email" => Ok(Self::Email),
            other => Err(format!("Unknown search field: {other}")),
        }
    }
}

/// Profile store operations
#[derive(Clone)]
pub struct ProfileStore {
    db: Database,
    validator: Validator,
}

impl ProfileStore {
    pub fn new(db: Database, validator: Validator) -> Self {
        Self { db, validator }
    }

    /// Insert a profile; the email must not belong to anyone yet
    pub fn insert(&self, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let profile = profile.normalized();
        profile.validate(&self.validator)?;
        let now = Utc::now();

        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (name, email, age, phone, address, gender, education, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    profile.name,
                    profile.email,
                    profile.age,
                    profile.phone,
                    profile.address,
                    profile.gender,
                    profile.education,
                    now
                ],
            );

            match inserted {
                Ok(_) => {
                    let id = conn.last_insert_rowid();
                    info!(user_id = id, email = %profile.email, "User inserted");
                    Ok(UserProfile {
                        id,
                        name: profile.name,
                        email: profile.email,
                        age: profile.age,
                        phone: profile.phone,
                        address: profile.address,
                        gender: profile.gender,
                        education: profile.education,
                        created_at: now,
                    })
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(email = %profile.email, "Email already exists");
                    Err(StoreError::duplicate(ENTITY, profile.email))
                }
                Err(e) => {
                    error!(email = %profile.email, error = %e, "User insert failed");
                    Err(e.into())
                }
            }
        })
    }

    /// Replace the profile with `id`; `created_at` is kept
    pub fn update(&self, id: i64, profile: NewProfile) -> Result<UserProfile, StoreError> {
        let profile = profile.normalized();
        profile.validate(&self.validator)?;

        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET name = ?1, email = ?2, age = ?3, phone = ?4, address = ?5, gender = ?6, education = ?7
                 WHERE id = ?8",
                params![
                    profile.name,
                    profile.email,
                    profile.age,
                    profile.phone,
                    profile.address,
                    profile.gender,
                    profile.education,
                    id
                ],
            );

            match updated {
                Ok(0) => {
                    warn!(user_id = id, "User to update not found");
                    Err(StoreError::not_found(ENTITY, id.to_string()))
                }
                Ok(_) => {
                    info!(user_id = id, "User updated");
                    find_by_id(conn, id)?
                        .ok_or_else(|| StoreError::not_found(ENTITY, id.to_string()))
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(user_id = id, email = %profile.email, "Email belongs to another user");
                    Err(StoreError::duplicate(ENTITY, profile.email.clone()))
                }
                Err(e) => {
                    error!(user_id = id, error = %e, "User update failed");
                    Err(e.into())
                }
            }
        })
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            if deleted == 0 {
                warn!(user_id = id, "User to delete not found");
                return Err(StoreError::not_found(ENTITY, id.to_string()));
            }
            info!(user_id = id, "User deleted");
            Ok(())
        })
    }

    pub fn get(&self, id: i64) -> Result<Option<UserProfile>, StoreError> {
        self.db.with_conn(|conn| find_by_id(conn, id))
    }

    /// All profiles, most recently created first
    pub fn fetch_all(&self) -> Result<Vec<UserProfile>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_USERS} {ORDER_USERS}"))?;
            let users = stmt
                .query_map([], profile_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    pub fn search(
        &self,
        term: &str,
        scope: ProfileSearchScope,
    ) -> Result<Vec<UserProfile>, StoreError> {
        let needle = term.trim().to_lowercase();
        let users = self.fetch_all()?;
        if needle.is_empty() {
            return Ok(users);
        }
        Ok(users
            .into_iter()
            .filter(|user| scope.matches(user, &needle))
            .collect())
    }

    pub fn export_csv(&self) -> Result<String, StoreError> {
        let users = self.fetch_all()?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for user in &users {
            let age = user.age.to_string();
            writer.write_record([
                user.name.as_str(),
                user.email.as_str(),
                age.as_str(),
                user.phone.as_str(),
                user.address.as_str(),
                user.gender.as_str(),
                user.education.as_str(),
            ])?;
        }
        info!(count = users.len(), "Users exported");
        finish_csv(writer)
    }

    /// Upsert rows from CSV by email
    ///
    /// A malformed age reads as zero and then fails validation like any other
    /// bad row; bad rows are skipped and the rest still apply.
    pub fn import_csv(&self, data: &str) -> Result<usize, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = line + 2, error = %e, "Skipping unreadable user row");
                    continue;
                }
            };
            if record.len() < CSV_HEADER.len() {
                warn!(line = line + 2, "Skipping short user row");
                continue;
            }

            let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
            let profile = NewProfile {
                name: field(0),
                email: field(1),
                age: field(2).parse().unwrap_or(0),
                phone: field(3),
                address: field(4),
                gender: field(5),
                education: field(6),
            };
            match profile.validate(&self.validator) {
                Ok(()) => rows.push(profile),
                Err(e) => warn!(line = line + 2, reason = e.reason, "Skipping invalid user row"),
            }
        }

        let imported = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let mut imported = 0usize;
            for profile in &rows {
                match upsert_profile(&tx, profile, now) {
                    Ok(()) => imported += 1,
                    Err(e) => warn!(email = %profile.email, error = %e, "Skipping user row"),
                }
            }
            tx.commit()?;
            Ok(imported)
        })?;

        info!(imported, total = rows.len(), "Users imported");
        Ok(imported)
    }
}

fn upsert_profile(
    conn: &Connection,
    profile: &NewProfile,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let updated = conn.execute(
        "UPDATE users
         SET name = ?1, age = ?2, phone = ?3, address = ?4, gender = ?5, education = ?6
         WHERE email = ?7",
        params![
            profile.name,
            profile.age,
            profile.phone,
            profile.address,
            profile.gender,
            profile.education,
            profile.email
        ],
    )?;
    if updated == 0 {
        conn.execute(
            "INSERT INTO users (name, email, age, phone, address, gender, education, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                profile.name,
                profile.email,
                profile.age,
                profile.phone,
                profile.address,
                profile.gender,
                profile.education,
                now
            ],
        )?;
    }
    Ok(())
}

fn find_by_id(conn: &Connection, id: i64) -> Result<Option<UserProfile>, StoreError> {
    let user = conn
        .query_row(&format!("{SELECT_USERS} WHERE id = ?1"), [id], profile_from_row)
        .optional()?;
    Ok(user)
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        age: row.get("age")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        gender: row.get("gender")?,
        education: row.get("education")?,
        created_at: row.get("created_at")?,
    })
}
