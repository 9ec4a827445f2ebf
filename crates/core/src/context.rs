//! Request-scoped context.
//!
//! One context per in-flight request, bound to the task handling it.
//! Read it through [`ApiContext::current`]; never construct one outside the
//! gateway's dispatch scope.

use serde_json::Value;

tokio::task_local! {
    static API_CONTEXT: ApiContext;
}

/// Per-request value bag.
///
/// Concurrent requests never observe each other's context: the bag lives in
/// task-local storage and is dropped when the request scope ends.
#[derive(Debug, Clone, Default)]
pub struct ApiContext {
    // Authentication / identity (auth itself is stubbed).
    pub auth: bool,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub is_superuser: bool,

    // Endpoint metadata.
    pub api_name: Option<String>,
    pub api_method: Option<String>,

    // Request information.
    pub remote_addr: Option<String>,
    pub user_agent: Option<String>,
    pub path: Option<String>,

    /// Arguments the binder produced for this call.
    pub params: Option<Value>,
}

impl ApiContext {
    /// The active context, or `None` when called outside a request scope.
    /// Never creates one implicitly.
    pub fn current() -> Option<ApiContext> {
        API_CONTEXT.try_with(ApiContext::clone).ok()
    }

    /// Run `fut` with `ctx` bound as the current context.
    ///
    /// The previous context (if any) is restored when the future completes,
    /// whatever the outcome. This is the only way to bind a context.
    pub async fn scope<F>(ctx: ApiContext, fut: F) -> F::Output
    where
        F: Future,
    {
        API_CONTEXT.scope(ctx, fut).await
    }
}
