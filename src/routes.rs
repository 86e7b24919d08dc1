use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde_json::Value;

use crate::{
    dogs,
    envelope::Envelope,
    error::AppError,
    foods,
    messages::INDEX,
    state::AppState,
    utils::{get_document, get_id, get_params},
};

type Params = Result<Query<HashMap<String, String>>, QueryRejection>;
type Id = Result<Path<String>, PathRejection>;
type Body = Result<Json<Value>, JsonRejection>;

pub async fn index_handler() -> Envelope {
    Envelope::message(INDEX)
}

pub async fn list_dogs_handler(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Envelope, AppError> {
    dogs::list(&state, &get_params(params)?).await
}

pub async fn get_dog_handler(
    State(state): State<Arc<AppState>>,
    id: Id,
) -> Result<Envelope, AppError> {
    dogs::get(&state, &get_id(id)?).await
}

pub async fn create_dog_handler(
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Result<Envelope, AppError> {
    dogs::create(&state, get_document(body)?).await
}

pub async fn update_dog_handler(
    State(state): State<Arc<AppState>>,
    id: Id,
    body: Body,
) -> Result<Envelope, AppError> {
    dogs::update(&state, &get_id(id)?, get_document(body)?).await
}

pub async fn delete_dog_handler(
    State(state): State<Arc<AppState>>,
    id: Id,
) -> Result<Envelope, AppError> {
    dogs::delete(&state, &get_id(id)?).await
}

pub async fn list_foods_handler(
    State(state): State<Arc<AppState>>,
    params: Params,
) -> Result<Envelope, AppError> {
    foods::list(&state, &get_params(params)?).await
}

pub async fn get_food_handler(
    State(state): State<Arc<AppState>>,
    id: Id,
) -> Result<Envelope, AppError> {
    foods::get(&state, &get_id(id)?).await
}

pub async fn create_food_handler(
    State(state): State<Arc<AppState>>,
    body: Body,
) -> Result<Envelope, AppError> {
    foods::create(&state, get_document(body)?).await
}

pub async fn update_food_handler(
    State(state): State<Arc<AppState>>,
    id: Id,
    body: Body,
) -> Result<Envelope, AppError> {
    foods::update(&state, &get_id(id)?, get_document(body)?).await
}

pub async fn delete_food_handler(
    State(state): State<Arc<AppState>>,
    id: Id,
) -> Result<Envelope, AppError> {
    foods::delete(&state, &get_id(id)?).await
}
