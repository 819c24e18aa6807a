use axum::Json;

use crate::middleware::auth::AuthIdentity;
use crate::models::identity::Identity;
use crate::models::DataResponse;

pub async fn get_session(AuthIdentity(identity): AuthIdentity) -> Json<DataResponse<Identity>> {
    Json(DataResponse::new(identity))
}
