//! Guard middleware for applications embedding the traffic guard.
//!
//! Register a `web::Data<TrafficGuard>` and wrap the protected routes:
//!
//! ```ignore
//! App::new()
//!     .app_data(web::Data::from(guard))
//!     .wrap(actix_web::middleware::from_fn(traffic_guard))
//! ```

use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web, Error,
};
use log::warn;

use crate::api::rejection_response;
use crate::core::TrafficGuard;

pub async fn traffic_guard(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let decision = req
        .app_data::<web::Data<TrafficGuard>>()
        .map(|guard| guard.check(req.method().as_str(), req.path(), req.headers()));
    let Some(decision) = decision else {
        warn!("traffic_guard middleware installed without TrafficGuard app data");
        return Ok(next.call(req).await?.map_into_boxed_body());
    };

    if let Some(response) = rejection_response(&decision) {
        return Ok(req.into_response(response));
    }
    Ok(next.call(req).await?.map_into_boxed_body())
}
