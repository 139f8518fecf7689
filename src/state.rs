use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    mailer::Mailer,
    otp::OtpStore,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub otp: OtpStore,
    pub mailer: Mailer,
    pub config: AppConfig,
}
