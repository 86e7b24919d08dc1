//! # Dogs
//!
//! List, fetch, create, update and delete dog records.
//!
//! A dog's `foodList` is stored as food ids. Listing and fetching swap
//! those ids for food summaries (foodtype, flavor, cost), dropping ids whose
//! food item no longer exists. Create, update and delete return the stored
//! ids as they are.
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::{
    envelope::Envelope,
    error::{AppError, Resource},
    id::RecordId,
    messages::{DOG_CREATED, DOG_DELETED, DOG_FOUND, DOG_LIST, DOG_UPDATED},
    models::{DOG_FOOD_LIST, Dog, Food},
    query::{DOG_SCHEMA, ListQuery},
    state::AppState,
    store::{Collection, Document, from_document, to_document},
    utils::{merge, pick, shown, strip_reserved},
};

pub async fn list(state: &AppState, params: &HashMap<String, String>) -> Result<Envelope, AppError> {
    let query = ListQuery::build(&DOG_SCHEMA, params, state.config.number_parsing)?;

    let mut dogs = state
        .store
        .find(Collection::Dogs, &query.selection)
        .await?;
    expand_food_lists(state, &mut dogs).await?;

    let items = dogs
        .into_iter()
        .map(|mut dog| {
            query.projection.apply(&mut dog);
            Value::Object(dog)
        })
        .collect();

    Ok(Envelope::list(DOG_LIST, query.page, items))
}

pub async fn get(state: &AppState, raw_id: &str) -> Result<Envelope, AppError> {
    let id = state.key(raw_id)?;

    let dog = state
        .store
        .find_by_id(Collection::Dogs, &id)
        .await?
        .ok_or(AppError::NotFound(Resource::Dog))?;

    let mut dogs = [dog];
    expand_food_lists(state, &mut dogs).await?;
    let [dog] = dogs;

    Ok(Envelope::ok(DOG_FOUND, shown(dog)))
}

pub async fn create(state: &AppState, mut payload: Document) -> Result<Envelope, AppError> {
    strip_reserved(&mut payload);

    let dog = Dog::validate(RecordId::generate(), &payload)?;
    let stored = state
        .store
        .insert(Collection::Dogs, to_document(&dog)?)
        .await?;

    Ok(Envelope::created(DOG_CREATED, Value::Object(stored)))
}

pub async fn update(state: &AppState, raw_id: &str, mut patch: Document) -> Result<Envelope, AppError> {
    let id = state.key(raw_id)?;
    strip_reserved(&mut patch);

    let current = state
        .store
        .find_by_id(Collection::Dogs, &id)
        .await?
        .ok_or(AppError::NotFound(Resource::Dog))?;

    let dog = Dog::validate(id.clone(), &merge(&current, &patch))?;

    let updated = state
        .store
        .update_by_id(Collection::Dogs, &id, pick(&to_document(&dog)?, &patch))
        .await?
        .ok_or(AppError::NotFound(Resource::Dog))?;

    Ok(Envelope::ok(DOG_UPDATED, shown(updated)))
}

pub async fn delete(state: &AppState, raw_id: &str) -> Result<Envelope, AppError> {
    let id = state.key(raw_id)?;

    let deleted = state
        .store
        .delete_by_id(Collection::Dogs, &id)
        .await?
        .ok_or(AppError::NotFound(Resource::Dog))?;

    Ok(Envelope::ok(DOG_DELETED, shown(deleted)))
}

fn food_ids(dog: &Document) -> impl Iterator<Item = RecordId> + '_ {
    dog.get(DOG_FOOD_LIST)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|id| id.as_str().and_then(|raw| raw.parse().ok()))
}

async fn expand_food_lists(state: &AppState, dogs: &mut [Document]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    let wanted: Vec<RecordId> = dogs
        .iter()
        .flat_map(food_ids)
        .filter(|id| seen.insert(id.clone()))
        .collect();

    let mut summaries = HashMap::new();
    for document in state.store.find_by_ids(Collection::Foods, &wanted).await? {
        let food: Food = from_document(document)?;
        summaries.insert(food.id.clone(), Value::Object(to_document(&food.summary())?));
    }

    for dog in dogs.iter_mut() {
        if !dog.contains_key(DOG_FOOD_LIST) {
            continue;
        }

        let expanded: Vec<Value> = food_ids(dog)
            .filter_map(|id| summaries.get(&id).cloned())
            .collect();

        dog.insert(DOG_FOOD_LIST.to_string(), Value::Array(expanded));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use super::{create, delete, get, list, update};
    use crate::{
        error::{AppError, Resource},
        foods,
        id::RecordId,
        state::AppState,
        store::Collection,
        testing::{doc, state},
    };

    const MISSING: &str = "507f1f77bcf86cd799439011";

    async fn add(state: &AppState, name: &str, breed: &str, age: u8) -> String {
        let created = create(
            state,
            doc(json!({"name": name, "breed": breed, "size": "Medium", "age": age})),
        )
        .await
        .unwrap();

        created.data.unwrap()["_id"].as_str().unwrap().to_string()
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn names(data: &Value) -> Vec<&str> {
        data.as_array()
            .unwrap()
            .iter()
            .map(|dog| dog["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let state = state();

        let created = create(
            &state,
            doc(json!({"name": "Rex", "breed": "Labrador", "size": "Big", "age": 3})),
        )
        .await
        .unwrap();

        assert_eq!(created.status, StatusCode::CREATED);
        let data = created.data.unwrap();
        assert_eq!(data["foodList"], json!([]));
        assert_eq!(data["__v"], 0);

        let id = data["_id"].as_str().unwrap();
        let fetched = get(&state, id).await.unwrap();
        let dog = fetched.data.unwrap();

        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(
            dog,
            json!({"_id": id, "name": "Rex", "breed": "Labrador", "size": "Big", "age": 3, "foodList": []})
        );
        assert!(fetched.count.is_none());
        assert!(fetched.page.is_none());
    }

    #[tokio::test]
    async fn test_client_id_is_ignored() {
        let state = state();

        let created = create(
            &state,
            doc(json!({"_id": MISSING, "__v": 9, "name": "Rex", "breed": "Lab", "size": "Big", "age": 3})),
        )
        .await
        .unwrap();

        let data = created.data.unwrap();
        assert_ne!(data["_id"], MISSING);
        assert_eq!(data["__v"], 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_a_validation_error() {
        let state = state();

        let result = create(&state, doc(json!({"name": "Rex", "size": "Tiny", "age": 30}))).await;
        let Err(AppError::Validation(error)) = result else {
            panic!("expected a validation error");
        };

        assert!(error.field("breed").is_some());
        assert!(error.field("size").is_some());
        assert!(error.field("age").is_some());
        assert_eq!(
            AppError::Validation(error).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_malformed_ids() {
        let state = state();

        for raw in ["123", "not-an-id", "507f1f77bcf86cd79943901z"] {
            assert!(matches!(get(&state, raw).await, Err(AppError::InvalidIdentifier)));
            assert!(matches!(
                update(&state, raw, doc(json!({"age": 4}))).await,
                Err(AppError::InvalidIdentifier)
            ));
            assert!(matches!(delete(&state, raw).await, Err(AppError::InvalidIdentifier)));
        }
    }

    #[tokio::test]
    async fn test_missing_ids() {
        let state = state();

        assert!(matches!(
            get(&state, MISSING).await,
            Err(AppError::NotFound(Resource::Dog))
        ));
        assert!(matches!(
            update(&state, MISSING, doc(json!({"age": 4}))).await,
            Err(AppError::NotFound(Resource::Dog))
        ));
        assert!(matches!(
            delete(&state, MISSING).await,
            Err(AppError::NotFound(Resource::Dog))
        ));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_validated() {
        let state = state();
        let id = add(&state, "Rex", "Labrador", 3).await;

        let updated = update(&state, &id, doc(json!({"age": "5", "colour": "brown"})))
            .await
            .unwrap();
        let dog = updated.data.unwrap();

        assert_eq!(dog["age"], 5);
        assert_eq!(dog["name"], "Rex");
        assert!(dog.get("colour").is_none());
        assert!(dog.get("__v").is_none());

        let rejected = update(&state, &id, doc(json!({"age": 40}))).await;
        assert!(matches!(rejected, Err(AppError::Validation(_))));

        let dog = get(&state, &id).await.unwrap().data.unwrap();
        assert_eq!(dog["age"], 5);
    }

    #[tokio::test]
    async fn test_update_leaves_version_alone() {
        let state = state();
        let id: RecordId = "507f1f77bcf86cd799439012".parse().unwrap();

        state
            .store
            .insert(
                Collection::Dogs,
                doc(json!({
                    "_id": id, "name": "Rex", "breed": "Lab", "size": "Big", "age": 3,
                    "foodList": [], "__v": 5_000_000_000_u64
                })),
            )
            .await
            .unwrap();

        update(&state, id.as_str(), doc(json!({"age": 4, "__v": 0})))
            .await
            .unwrap();

        let stored = state
            .store
            .find_by_id(Collection::Dogs, &id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["age"], 4);
        assert_eq!(stored["__v"], 5_000_000_000_u64);
    }

    #[tokio::test]
    async fn test_delete_returns_snapshot() {
        let state = state();
        let id = add(&state, "Rex", "Labrador", 3).await;

        let deleted = delete(&state, &id).await.unwrap();
        assert_eq!(deleted.data.unwrap()["name"], "Rex");

        assert!(matches!(
            get(&state, &id).await,
            Err(AppError::NotFound(Resource::Dog))
        ));
    }

    #[tokio::test]
    async fn test_list_defaults() {
        let state = state();
        for n in 0..12 {
            add(&state, &format!("dog{n:02}"), "Beagle", 2).await;
        }

        let listed = list(&state, &HashMap::new()).await.unwrap();
        let data = listed.data.unwrap();

        assert_eq!(listed.count, Some(10));
        assert_eq!(listed.page, Some(1));
        assert_eq!(names(&data)[0], "dog00");
        assert_eq!(names(&data)[9], "dog09");
        assert!(data[0].get("__v").is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let state = state();
        add(&state, "Rex", "Labrador", 3).await;
        add(&state, "Ace", "Beagle", 12).await;
        add(&state, "Milo", "Poodle", 5).await;
        add(&state, "Bo", "Beagle", 10).await;
        add(&state, "Zed", "Labrador", 1).await;

        let by_age = list(&state, &params(&[("minAge", "2"), ("maxAge", "10")]))
            .await
            .unwrap();
        assert_eq!(names(&by_age.data.unwrap()), ["Bo", "Milo", "Rex"]);

        let by_breed = list(&state, &params(&[("breed", "Labrador,Beagle")]))
            .await
            .unwrap();
        assert_eq!(names(&by_breed.data.unwrap()), ["Ace", "Bo", "Rex", "Zed"]);

        let paged = list(&state, &params(&[("page", "2"), ("limit", "2")]))
            .await
            .unwrap();
        assert_eq!(paged.page, Some(2));
        assert_eq!(names(&paged.data.unwrap()), ["Milo", "Rex"]);
    }

    #[tokio::test]
    async fn test_list_expands_food_and_projects() {
        let state = state();
        let id = add(&state, "Rex", "Labrador", 3).await;

        foods::create(
            &state,
            doc(json!({"dog": id, "foodtype": "wet", "flavor": "beef", "cost": 5})),
        )
        .await
        .unwrap();

        let listed = list(&state, &HashMap::new()).await.unwrap();
        let dog = &listed.data.unwrap()[0];
        assert_eq!(
            dog["foodList"],
            json!([{"foodtype": "wet", "flavor": "beef", "cost": 5}])
        );

        let trimmed = list(&state, &params(&[("excludeFields", "foodList,breed")]))
            .await
            .unwrap();
        let dog = &trimmed.data.unwrap()[0];
        assert!(dog.get("foodList").is_none());
        assert!(dog.get("breed").is_none());
        assert_eq!(dog["__v"], 1);
    }

    #[tokio::test]
    async fn test_dangling_food_ids_are_skipped() {
        let state = state();
        let id = add(&state, "Rex", "Labrador", 3).await;

        let created = foods::create(
            &state,
            doc(json!({"dog": id, "foodtype": "dry", "flavor": "lamb", "cost": 8})),
        )
        .await
        .unwrap();
        let food_id = created.data.unwrap()["_id"].as_str().unwrap().to_string();

        foods::delete(&state, &food_id).await.unwrap();

        let dog = get(&state, &id).await.unwrap().data.unwrap();
        assert_eq!(dog["foodList"], json!([]));
    }
}
