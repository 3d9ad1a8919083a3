//! Field validation - pure predicates over raw form input
//!
//! Nothing in here touches storage. Every check is a total function over
//! strings that returns `Ok(())` or the first failing rule with the message
//! the presentation layer shows verbatim.

mod form;
mod rules;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use form::FormInput;
pub use rules::{
    clean_phone, is_known_education, is_known_gender, is_known_log_status, parse_age,
    parse_log_date, parse_log_hours, parse_price, parse_quantity, AGE_RANGE, EDUCATION_LEVELS,
    GENDERS, LOG_HOURS_RANGE, LOG_STATUSES, PHONE_DIGITS,
};

/// Default upper bound for inventory item codes
pub const DEFAULT_ITEM_CODE_MAX_LEN: usize = 10;

/// Every field the validator knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    Email,
    Age,
    Phone,
    Address,
    Gender,
    Education,
    ItemCode,
    ItemName,
    ItemQuantity,
    ItemPrice,
    LogTitle,
    LogHours,
    LogDate,
    LogStatus,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Age => "age",
            Field::Phone => "phone",
            Field::Address => "address",
            Field::Gender => "gender",
            Field::Education => "education",
            Field::ItemCode => "item_code",
            Field::ItemName => "item_name",
            Field::ItemQuantity => "item_quantity",
            Field::ItemPrice => "item_price",
            Field::LogTitle => "log_title",
            Field::LogHours => "log_hours",
            Field::LogDate => "log_date",
            Field::LogStatus => "log_status",
        }
    }

    /// Message reported when this field fails its rule
    pub fn reason(&self) -> &'static str {
        match self {
            Field::Name => "Name is required",
            Field::Email => "Invalid email format",
            Field::Age => "Age must be a number between 10 and 100",
            Field::Phone => "Phone number must be exactly 13 digits",
            Field::Address => "Address is required",
            Field::Gender => "Please select a gender",
            Field::Education => "Please select your education",
            Field::ItemCode | Field::ItemName => "Kode dan Nama harus diisi",
            Field::ItemQuantity => "Jumlah tidak boleh negatif",
            Field::ItemPrice => "Harga tidak boleh negatif",
            Field::LogTitle => "Judul kegiatan tidak boleh kosong!",
            Field::LogHours => "JKEM harus antara 1 dan 24 jam",
            Field::LogDate => "Tanggal harus berformat YYYY-MM-DD",
            Field::LogStatus => "Status kegiatan tidak dikenal",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim() {
            "name" => Field::Name,
            "email" => Field::Email,
            "age" => Field::Age,
            "phone" => Field::Phone,
            "address" => Field::Address,
            "gender" => Field::Gender,
            "education" => Field::Education,
            "item_code" => Field::ItemCode,
            "item_name" => Field::ItemName,
            "item_quantity" => Field::ItemQuantity,
            "item_price" => Field::ItemPrice,
            "log_title" => Field::LogTitle,
            "log_hours" => Field::LogHours,
            "log_date" => Field::LogDate,
            "log_status" => Field::LogStatus,
            other => return Err(UnknownField(other.to_string())),
        };
        Ok(field)
    }
}

/// Field name that matches no known rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown field: {0}")]
pub struct UnknownField(pub String);

/// A failed field rule
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: &'static str,
}

impl ValidationError {
    pub fn new(field: Field) -> Self {
        Self {
            field,
            reason: field.reason(),
        }
    }

    /// Numeric field whose text does not parse at all
    pub fn not_a_number(field: Field) -> Self {
        let reason = match field {
            Field::ItemQuantity => "Jumlah harus berupa bilangan bulat",
            Field::ItemPrice => "Harga harus berupa angka",
            other => other.reason(),
        };
        Self { field, reason }
    }
}

/// Quantity or price: blank reads as zero, anything else must be a
/// non-negative number
fn check_amount(field: Field, raw: &str) -> Result<(), ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }
    let value = match field {
        Field::ItemQuantity => raw.parse::<i64>().ok().map(|q| q as f64),
        _ => raw.parse::<f64>().ok().filter(|p| p.is_finite()),
    };
    match value {
        None => Err(ValidationError::not_a_number(field)),
        Some(v) if v < 0.0 => Err(ValidationError::new(field)),
        Some(_) => Ok(()),
    }
}

/// Validator for raw form input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    item_code_max_len: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_CODE_MAX_LEN)
    }
}

impl Validator {
    pub fn new(item_code_max_len: usize) -> Self {
        Self { item_code_max_len }
    }

    pub fn item_code_max_len(&self) -> usize {
        self.item_code_max_len
    }

    /// Check one raw field value against its rule
    pub fn validate(&self, field: Field, raw: &str) -> Result<(), ValidationError> {
        let ok = match field {
            Field::Name | Field::Address | Field::ItemName | Field::LogTitle => {
                rules::is_present(raw)
            }
            Field::Email => rules::is_valid_email(raw),
            Field::Age => parse_age(raw).is_some(),
            Field::Phone => rules::is_valid_phone(raw),
            Field::Gender => is_known_gender(raw),
            Field::Education => is_known_education(raw),
            Field::ItemCode => {
                let code = raw.trim();
                !code.is_empty() && code.chars().count() <= self.item_code_max_len
            }
            Field::ItemQuantity | Field::ItemPrice => return check_amount(field, raw),
            Field::LogHours => parse_log_hours(raw).is_some(),
            Field::LogDate => parse_log_date(raw).is_some(),
            Field::LogStatus => is_known_log_status(raw),
        };

        if ok {
            Ok(())
        } else {
            Err(ValidationError::new(field))
        }
    }

    /// Profile form checks, in display order; the first failure wins
    pub fn check_profile_form(&self, form: &FormInput) -> Result<(), ValidationError> {
        self.check_in_order(
            form,
            &[
                (Field::Name, "name"),
                (Field::Email, "email"),
                (Field::Age, "age"),
                (Field::Phone, "phone"),
                (Field::Address, "address"),
                (Field::Gender, "gender"),
                (Field::Education, "education"),
            ],
        )
    }

    /// Inventory form checks: code, name, then the optional numbers
    pub fn check_item_form(&self, form: &FormInput) -> Result<(), ValidationError> {
        self.check_in_order(
            form,
            &[
                (Field::ItemCode, "code"),
                (Field::ItemName, "name"),
                (Field::ItemQuantity, "quantity"),
                (Field::ItemPrice, "price"),
            ],
        )
    }

    /// Logbook form checks
    pub fn check_log_form(&self, form: &FormInput) -> Result<(), ValidationError> {
        self.check_in_order(
            form,
            &[
                (Field::LogTitle, "title"),
                (Field::LogHours, "hours"),
                (Field::LogDate, "date"),
                (Field::LogStatus, "status"),
            ],
        )
    }

    fn check_in_order(
        &self,
        form: &FormInput,
        fields: &[(Field, &str)],
    ) -> Result<(), ValidationError> {
        fields
            .iter()
            .try_for_each(|(field, key)| self.validate(*field, form.get(key)))
    }
}
