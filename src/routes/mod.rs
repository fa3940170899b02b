use actix_web::web;

pub mod ai;
pub mod backend_health;
pub mod wearable;

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(backend_health::backend_health)
        .service(backend_health::api_health);

    cfg.service(
        web::scope("/api/ai")
            .service(ai::generate)
            .service(ai::chat)
            .service(ai::history)
    );

    cfg.service(
        web::scope("/api/wearable")
            .service(wearable::auth_url)
            .service(wearable::callback_error)
            .service(wearable::callback)
            .service(wearable::webhook)
            .service(wearable::request_historical)
            .service(wearable::get_historical)
            .service(wearable::user_data)
            .service(wearable::test_connection)
    );
}
