//! # Food
//!
//! List, fetch, create, update and delete food items.
//!
//! ## Ownership
//! Every food item names its dog in `dog`. Listing and fetching replace that
//! id with a dog summary (name, breed, size, age), or `null` if the dog is
//! gone.
//!
//! ## Creating
//! 1. `dog` must be a well-formed key of an existing dog
//! 2. The food item is stored
//! 3. Its id is appended to the dog's `foodList`
//!
//! Steps 2 and 3 are separate writes. If step 3 fails the food item stays
//! stored but unlinked, and the failure is logged with both ids so it can
//! be relinked by hand. Step 3 is append-if-absent, so repeating it is safe.
//!
//! Updating or deleting a food item never touches the dog.
use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::warn;

use crate::{
    envelope::Envelope,
    error::{AppError, Resource},
    id::RecordId,
    messages::{FOOD_CREATED, FOOD_DELETED, FOOD_FOUND, FOOD_LIST, FOOD_UPDATED},
    models::{DOG_FOOD_LIST, Dog, FOOD_DOG, Food},
    query::{FOOD_SCHEMA, ListQuery},
    state::AppState,
    store::{Collection, Document, StoreError, from_document, to_document},
    utils::{merge, pick, shown, strip_reserved},
};

pub async fn list(state: &AppState, params: &HashMap<String, String>) -> Result<Envelope, AppError> {
    let query = ListQuery::build(&FOOD_SCHEMA, params, state.config.number_parsing)?;

    let mut foods = state
        .store
        .find(Collection::Foods, &query.selection)
        .await?;
    expand_dogs(state, &mut foods).await?;

    let items = foods
        .into_iter()
        .map(|mut food| {
            query.projection.apply(&mut food);
            Value::Object(food)
        })
        .collect();

    Ok(Envelope::list(FOOD_LIST, query.page, items))
}

pub async fn get(state: &AppState, raw_id: &str) -> Result<Envelope, AppError> {
    let id = state.key(raw_id)?;

    let food = state
        .store
        .find_by_id(Collection::Foods, &id)
        .await?
        .ok_or(AppError::NotFound(Resource::Food))?;

    let mut foods = [food];
    expand_dogs(state, &mut foods).await?;
    let [food] = foods;

    Ok(Envelope::ok(FOOD_FOUND, shown(food)))
}

pub async fn create(state: &AppState, mut payload: Document) -> Result<Envelope, AppError> {
    strip_reserved(&mut payload);

    let dog_id = payload
        .get(FOOD_DOG)
        .and_then(Value::as_str)
        .and_then(|raw| state.store.parse_key(raw))
        .ok_or(AppError::InvalidIdentifier)?;

    if state
        .store
        .find_by_id(Collection::Dogs, &dog_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(Resource::Dog));
    }

    let food = Food::validate(RecordId::generate(), &payload)?;
    let stored = state
        .store
        .insert(Collection::Foods, to_document(&food)?)
        .await?;

    link(state, &dog_id, &food.id).await?;

    Ok(Envelope::created(FOOD_CREATED, Value::Object(stored)))
}

pub async fn update(state: &AppState, raw_id: &str, mut patch: Document) -> Result<Envelope, AppError> {
    let id = state.key(raw_id)?;
    strip_reserved(&mut patch);

    let current = state
        .store
        .find_by_id(Collection::Foods, &id)
        .await?
        .ok_or(AppError::NotFound(Resource::Food))?;

    let food = Food::validate(id.clone(), &merge(&current, &patch))?;

    let updated = state
        .store
        .update_by_id(Collection::Foods, &id, pick(&to_document(&food)?, &patch))
        .await?
        .ok_or(AppError::NotFound(Resource::Food))?;

    Ok(Envelope::ok(FOOD_UPDATED, shown(updated)))
}

pub async fn delete(state: &AppState, raw_id: &str) -> Result<Envelope, AppError> {
    let id = state.key(raw_id)?;

    let deleted = state
        .store
        .delete_by_id(Collection::Foods, &id)
        .await?
        .ok_or(AppError::NotFound(Resource::Food))?;

    Ok(Envelope::ok(FOOD_DELETED, shown(deleted)))
}

async fn link(state: &AppState, dog_id: &RecordId, food_id: &RecordId) -> Result<(), AppError> {
    let result = state
        .store
        .push_unique(
            Collection::Dogs,
            dog_id,
            DOG_FOOD_LIST,
            Value::from(food_id.to_string()),
        )
        .await
        .and_then(|dog| {
            dog.map(|_| ()).ok_or_else(|| StoreError::DocumentNotFound {
                collection: Collection::Dogs.name(),
                id: dog_id.clone(),
            })
        });

    if let Err(e) = &result {
        warn!("Food {food_id} stored but not linked to dog {dog_id}: {e}");
    }

    Ok(result?)
}

fn dog_id(food: &Document) -> Option<RecordId> {
    food.get(FOOD_DOG)
        .and_then(Value::as_str)
        .and_then(|raw| raw.parse().ok())
}

async fn expand_dogs(state: &AppState, foods: &mut [Document]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    let wanted: Vec<RecordId> = foods
        .iter()
        .filter_map(dog_id)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let mut summaries = HashMap::new();
    for document in state.store.find_by_ids(Collection::Dogs, &wanted).await? {
        let dog: Dog = from_document(document)?;
        summaries.insert(dog.id.clone(), Value::Object(to_document(&dog.summary())?));
    }

    for food in foods.iter_mut() {
        if !food.contains_key(FOOD_DOG) {
            continue;
        }

        let summary = dog_id(food)
            .and_then(|id| summaries.get(&id).cloned())
            .unwrap_or(Value::Null);

        food.insert(FOOD_DOG.to_string(), summary);
    }

    Ok(())
}
