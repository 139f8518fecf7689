use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            AuthResponse, Claims, LoginRequest, OtpRequest, RegisterRequest,
            ResetPasswordRequest, VerifyOtpRequest,
        },
        orders::{
            AdminOrderList, AdminOrderSummary, CreateOrderRequest, OrderItemInput, OrderList,
            OrderWithItems, ShippingAddressInput, UpdateOrderStatusRequest,
        },
        users::{AddAddressRequest, ProfileResponse, UpdateProfileRequest, UserList},
    },
    models::{Address, Order, OrderItem, OrderStatus, User},
    response::ApiResponse,
    routes::{auth, health, orders, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::request_otp,
        auth::verify_otp,
        auth::forgot_password,
        auth::reset_password,
        auth::me,
        orders::create_order,
        orders::my_orders,
        orders::get_order,
        orders::list_all_orders,
        orders::update_status,
        users::get_profile,
        users::update_profile,
        users::add_address,
        users::delete_address,
        users::list_users
    ),
    components(
        schemas(
            User,
            Order,
            OrderItem,
            OrderStatus,
            Address,
            RegisterRequest,
            LoginRequest,
            OtpRequest,
            VerifyOtpRequest,
            ResetPasswordRequest,
            AuthResponse,
            Claims,
            CreateOrderRequest,
            OrderItemInput,
            ShippingAddressInput,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            AdminOrderSummary,
            AdminOrderList,
            UpdateProfileRequest,
            AddAddressRequest,
            ProfileResponse,
            UserList,
            health::HealthData,
            ApiResponse<AuthResponse>,
            ApiResponse<User>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<AdminOrderList>,
            ApiResponse<ProfileResponse>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, password and OTP login, password reset"),
        (name = "Orders", description = "Order creation and tracking"),
        (name = "Users", description = "Profile, addresses and admin user listing"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
