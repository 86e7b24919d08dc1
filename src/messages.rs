pub const INDEX: &str = "GET Request made";

pub const INVALID_ID: &str = "Invalid ID format";
pub const INVALID_QUERY: &str = "Invalid query parameter";
pub const SERVER_ERROR: &str = "Internal server error";

pub const DOG_NOT_FOUND: &str = "Dog not found";
pub const DOG_CREATED: &str = "Dog successfully created";
pub const DOG_UPDATED: &str = "Dog successfully updated";
pub const DOG_DELETED: &str = "Dog successfully deleted";
pub const DOG_FOUND: &str = "Dog found";
pub const DOG_LIST: &str = "All Dog's fetched successfully";

pub const FOOD_NOT_FOUND: &str = "Food not found";
pub const FOOD_CREATED: &str = "Food successfully created";
pub const FOOD_UPDATED: &str = "Food successfully updated";
pub const FOOD_DELETED: &str = "Food successfully deleted";
pub const FOOD_FOUND: &str = "Food found";
pub const FOOD_LIST: &str = "All Food fetched successfully";
