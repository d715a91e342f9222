//! Web服务器

use std::net::SocketAddr;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use medcare_core::{ClinicError, Result};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{auth_middleware, login_handler, logout_handler, me_handler, signup_handler};
use crate::handlers::{
    api_root, appointment_detail, calendar_view, cancel_appointment, change_password,
    consultation_detail, create_appointment, create_consultation, create_patient,
    create_prescription, dashboard, delete_account, delete_patient, health, list_appointments,
    list_consultations, list_patients, list_prescriptions, patient_detail, patient_prescriptions,
    prescription_delete, prescription_download, prescription_view, settings_view,
    update_appointment, update_appointment_status, update_consultation, update_notifications,
    update_patient, update_preferences, update_profile, AppState,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        let app = Self::create_app(state);
        Self { addr, app }
    }

    fn create_app(state: AppState) -> Router {
        // 业务路由，全部要求登录
        let api_routes = Router::new()
            .route("/dashboard", get(dashboard))
            .route("/patients", get(list_patients).post(create_patient))
            .route(
                "/patients/:id",
                get(patient_detail).put(update_patient).delete(delete_patient),
            )
            .route("/patients/:id/prescriptions", get(patient_prescriptions))
            .route(
                "/appointments",
                get(list_appointments).post(create_appointment),
            )
            .route(
                "/appointments/:id",
                get(appointment_detail).put(update_appointment),
            )
            .route("/appointments/:id/cancel", post(cancel_appointment))
            .route(
                "/appointments/:id/status/:status",
                post(update_appointment_status),
            )
            .route("/calendar", get(calendar_view))
            .route(
                "/consultations",
                get(list_consultations).post(create_consultation),
            )
            .route(
                "/consultations/:id",
                get(consultation_detail).put(update_consultation),
            )
            .route(
                "/prescriptions",
                get(list_prescriptions).post(create_prescription),
            )
            .route(
                "/prescriptions/:id",
                get(prescription_view).delete(prescription_delete),
            )
            .route("/prescriptions/:id/download", get(prescription_download))
            .route("/settings", get(settings_view))
            .route("/settings/profile", post(update_profile))
            .route("/settings/password", post(change_password))
            .route("/settings/notifications", post(update_notifications))
            .route("/settings/preferences", post(update_preferences))
            .route("/settings/account", delete(delete_account))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ));

        // 会话路由（登出与当前用户信息也要求有效令牌）
        let session_routes = Router::new()
            .route("/auth/logout", post(logout_handler))
            .route("/auth/me", get(me_handler))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            ));

        Router::new()
            // 根路径与健康检查
            .route("/", get(api_root))
            .route("/health", get(health))
            // 认证路由（无需令牌）
            .route("/auth/signup", post(signup_handler))
            .route("/auth/login", post(login_handler))
            .merge(session_routes)
            // API路由
            .nest("/api/v1", api_routes)
            // 全局中间件
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(
                        CorsLayer::new()
                            .allow_origin(Any)
                            .allow_methods(Any)
                            .allow_headers(Any),
                    ),
            )
            .with_state(state)
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| ClinicError::Internal(format!("web server failed: {e}")))?;

        Ok(())
    }
}
