//! # Records
//!
//! Dogs and food items as they are stored, plus the field rules a payload
//! must satisfy before it is written.
//!
//! ## Dog
//! - name: **string**, required, at most 20 characters
//! - breed: **string**, required, trimmed
//! - size: Small, Medium, Big or Large
//! - age: **int** in 1..=20
//! - foodList: ids of the dog's food items, defaults to empty
//!
//! ## Food
//! - dog: id of the owning dog, required
//! - foodtype: wet or dry, trimmed
//! - flavor: **string**, required, trimmed
//! - cost: **number** in 1..=60
//!
//! Every record also carries `_id` and a `__v` version counter.
//!
//! ## Validation
//! Payloads arrive as loose JSON. Numbers may come in as numeric strings,
//! unknown keys are dropped, and every broken field is reported at once:
//!
//! ```text
//! Dog validation failed: name: The dog's name should not be over 20 characters., age: The dog's age must be at least 1 year
//! ```
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::{id::RecordId, store::Document, utils::type_name};

pub const ID: &str = "_id";
pub const VERSION: &str = "__v";

pub const DOG_NAME: &str = "name";
pub const DOG_BREED: &str = "breed";
pub const DOG_SIZE: &str = "size";
pub const DOG_AGE: &str = "age";
pub const DOG_FOOD_LIST: &str = "foodList";

pub const FOOD_DOG: &str = "dog";
pub const FOOD_TYPE: &str = "foodtype";
pub const FOOD_FLAVOR: &str = "flavor";
pub const FOOD_COST: &str = "cost";

const DOG_NAME_MAX: usize = 20;
const DOG_AGE_MIN: i64 = 1;
const DOG_AGE_MAX: i64 = 20;
const FOOD_COST_MIN: f64 = 1.0;
const FOOD_COST_MAX: f64 = 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Size {
    Small,
    Medium,
    Big,
    Large,
}

impl Size {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Small" => Some(Self::Small),
            "Medium" => Some(Self::Medium),
            "Big" => Some(Self::Big),
            "Large" => Some(Self::Large),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoodType {
    Wet,
    Dry,
}

impl FoodType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "wet" => Some(Self::Wet),
            "dry" => Some(Self::Dry),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub name: String,
    pub breed: String,
    pub size: Size,
    pub age: u8,
    #[serde(rename = "foodList", default)]
    pub food_list: Vec<RecordId>,
    #[serde(rename = "__v", default)]
    pub version: u64,
}

impl Dog {
    /// Checks every field of `document` and builds the record under `id`.
    /// The version starts at 0 and is only ever bumped by the store.
    pub fn validate(id: RecordId, document: &Document) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(document);

        let name = fields.string(DOG_NAME, Some("You must give me the dog's name."), false);
        if let Some(name) = &name {
            if name.chars().count() > DOG_NAME_MAX {
                fields.fail(DOG_NAME, "The dog's name should not be over 20 characters.");
            }
        }

        let breed = fields.string(DOG_BREED, Some("You must give me the dog's breed."), true);
        let size = fields.choice(DOG_SIZE, Size::parse);

        let age = fields.integer(DOG_AGE).and_then(|age| {
            if age < DOG_AGE_MIN {
                fields.fail(DOG_AGE, "The dog's age must be at least 1 year");
                None
            } else if age > DOG_AGE_MAX {
                fields.fail(DOG_AGE, "If your dog is older than 20, it's not a dog.");
                None
            } else {
                u8::try_from(age).ok()
            }
        });

        let food_list = fields.keys(DOG_FOOD_LIST);

        let (Some(name), Some(breed), Some(size), Some(age), Some(food_list)) =
            (name, breed, size, age, food_list)
        else {
            return Err(fields.into_error("Dog"));
        };

        fields.finish("Dog", Self {
            id,
            name,
            breed,
            size,
            age,
            food_list,
            version: 0,
        })
    }

    pub fn summary(&self) -> DogSummary {
        DogSummary {
            name: self.name.clone(),
            breed: self.breed.clone(),
            size: self.size,
            age: self.age,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Food {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub dog: RecordId,
    pub foodtype: FoodType,
    pub flavor: String,
    #[serde(serialize_with = "whole_as_integer")]
    pub cost: f64,
    #[serde(rename = "__v", default)]
    pub version: u64,
}

impl Food {
    pub fn validate(id: RecordId, document: &Document) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(document);

        let dog = fields.key(FOOD_DOG);
        let foodtype = fields.choice_trimmed(FOOD_TYPE, FoodType::parse);
        let flavor = fields.string(FOOD_FLAVOR, None, true);

        let cost = fields.number(FOOD_COST).and_then(|cost| {
            if cost < FOOD_COST_MIN {
                fields.fail(
                    FOOD_COST,
                    &format!("Path `cost` ({cost}) is less than minimum allowed value (1)."),
                );
                None
            } else if cost > FOOD_COST_MAX {
                fields.fail(
                    FOOD_COST,
                    &format!("Path `cost` ({cost}) is more than maximum allowed value (60)."),
                );
                None
            } else {
                Some(cost)
            }
        });

        let (Some(dog), Some(foodtype), Some(flavor), Some(cost)) = (dog, foodtype, flavor, cost)
        else {
            return Err(fields.into_error("Food"));
        };

        fields.finish("Food", Self {
            id,
            dog,
            foodtype,
            flavor,
            cost,
            version: 0,
        })
    }

    pub fn summary(&self) -> FoodSummary {
        FoodSummary {
            foodtype: self.foodtype,
            flavor: self.flavor.clone(),
            cost: self.cost,
        }
    }
}

/// A dog as shown inside a food item.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DogSummary {
    pub name: String,
    pub breed: String,
    pub size: Size,
    pub age: u8,
}

/// A food item as shown inside a dog's `foodList`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FoodSummary {
    pub foodtype: FoodType,
    pub flavor: String,
    #[serde(serialize_with = "whole_as_integer")]
    pub cost: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: &'static str,
    pub message: String,
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{model} validation failed: {}", join_errors(.errors))]
pub struct ValidationError {
    pub model: &'static str,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn field(&self, path: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|error| error.path == path)
            .map(|error| error.message.as_str())
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.path, error.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whole numbers go out as integers, the way the stored JSON had them.
fn whole_as_integer<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

/// Reads typed fields out of a loose document, collecting failures.
struct Fields<'a> {
    document: &'a Document,
    errors: Vec<FieldError>,
}

impl<'a> Fields<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            document,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, path: &'static str, message: &str) {
        self.errors.push(FieldError {
            path,
            message: message.to_string(),
        });
    }

    fn cast_failed(&mut self, kind: &str, path: &'static str, value: &Value) {
        let shown = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        self.fail(
            path,
            &format!(
                "Cast to {kind} failed for value \"{shown}\" (type {}) at path \"{path}\"",
                type_name(value)
            ),
        );
    }

    fn present(&mut self, path: &'static str, required: Option<&str>) -> Option<&'a Value> {
        let document = self.document;

        match document.get(path) {
            None | Some(Value::Null) => {
                let message = required
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Path `{path}` is required."));
                self.fail(path, &message);
                None
            }
            Some(value) => Some(value),
        }
    }

    fn string(&mut self, path: &'static str, required: Option<&str>, trim: bool) -> Option<String> {
        let value = self.present(path, required)?;

        let raw = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                self.cast_failed("string", path, other);
                return None;
            }
        };

        let raw = if trim { raw.trim().to_string() } else { raw };

        if raw.is_empty() {
            let message = required
                .map(str::to_string)
                .unwrap_or_else(|| format!("Path `{path}` is required."));
            self.fail(path, &message);
            return None;
        }

        Some(raw)
    }

    fn choice<T>(&mut self, path: &'static str, parse: fn(&str) -> Option<T>) -> Option<T> {
        self.choice_with(path, parse, false)
    }

    fn choice_trimmed<T>(&mut self, path: &'static str, parse: fn(&str) -> Option<T>) -> Option<T> {
        self.choice_with(path, parse, true)
    }

    fn choice_with<T>(
        &mut self,
        path: &'static str,
        parse: fn(&str) -> Option<T>,
        trim: bool,
    ) -> Option<T> {
        let raw = self.string(path, None, trim)?;

        let parsed = parse(&raw);
        if parsed.is_none() {
            self.fail(
                path,
                &format!("`{raw}` is not a valid enum value for path `{path}`."),
            );
        }

        parsed
    }

    fn number(&mut self, path: &'static str) -> Option<f64> {
        let value = self.present(path, None)?;

        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if !s.trim().is_empty() => {
                s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        };

        if parsed.is_none() {
            self.cast_failed("Number", path, value);
        }

        parsed
    }

    fn integer(&mut self, path: &'static str) -> Option<i64> {
        let number = self.number(path)?;

        if number.fract() != 0.0 {
            self.fail(path, &format!("Path `{path}` ({number}) is not an integer."));
            return None;
        }

        Some(number as i64)
    }

    fn key(&mut self, path: &'static str) -> Option<RecordId> {
        let value = self.present(path, None)?;

        let parsed = value.as_str().and_then(|raw| raw.parse().ok());
        if parsed.is_none() {
            self.cast_failed("ObjectId", path, value);
        }

        parsed
    }

    /// Optional list of keys; absent or null reads as empty.
    fn keys(&mut self, path: &'static str) -> Option<Vec<RecordId>> {
        let document = self.document;

        let items = match document.get(path) {
            None | Some(Value::Null) => return Some(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.cast_failed("[ObjectId]", path, other);
                return None;
            }
        };

        let parsed: Option<Vec<RecordId>> = items
            .iter()
            .map(|item| item.as_str().and_then(|raw| raw.parse().ok()))
            .collect();

        if parsed.is_none() {
            self.cast_failed("[ObjectId]", path, &Value::Array(items.clone()));
        }

        parsed
    }

    fn finish<T>(self, model: &'static str, record: T) -> Result<T, ValidationError> {
        if self.errors.is_empty() {
            Ok(record)
        } else {
            Err(self.into_error(model))
        }
    }

    fn into_error(self, model: &'static str) -> ValidationError {
        ValidationError {
            model,
            errors: self.errors,
        }
    }
}
