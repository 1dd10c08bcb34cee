//! HTTP handler functions for the crime dashboard API.

use actix_web::{HttpResponse, web};
use crime_dashboard::DashboardError;
use crime_dashboard_analytics::{AnalyticsError, queries};
use crime_dashboard_database::CrimeStore;
use crime_dashboard_models::{DEFAULT_TOP_LIMIT, DateRange, Filter};
use crime_dashboard_server_models::{
    ApiDashboard, ApiError, ApiHealth, ApiHeatmap, ApiOffenses, ApiOptions, ApiTopCategories,
    DashboardQueryParams,
};

use crate::AppState;

/// Maps a query failure to a response. Rejected filters are the client's
/// fault; everything else is logged and reported as a server error.
fn error_response(context: &str, e: &AnalyticsError) -> HttpResponse {
    match e {
        AnalyticsError::InvalidFilter(e) => HttpResponse::BadRequest().json(ApiError {
            error: e.to_string(),
        }),
        e => {
            log::error!("Failed to {context}: {e}");
            HttpResponse::InternalServerError().json(ApiError {
                error: format!("Failed to {context}"),
            })
        }
    }
}

/// Maps a dashboard failure to a response. An empty store has no default
/// date range, which is reported as not found.
fn dashboard_error_response(context: &str, e: &DashboardError) -> HttpResponse {
    match e {
        DashboardError::Analytics(e) => error_response(context, e),
        DashboardError::NoData => HttpResponse::NotFound().json(ApiError {
            error: e.to_string(),
        }),
    }
}

/// Builds the request filter. Missing date bounds default to the span of
/// the whole dataset.
async fn resolve_filter(
    store: &CrimeStore,
    params: &DashboardQueryParams,
) -> Result<Filter, DashboardError> {
    let fallback = if params.needs_default_range() {
        let months = queries::list_available_months(store).await?;
        Some(DateRange::spanning_months(&months).ok_or(DashboardError::NoData)?)
    } else {
        None
    };

    Ok(params
        .to_filter(fallback)
        .map_err(AnalyticsError::from)?)
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/options`
///
/// Lists the months and districts offered by the filter widgets.
pub async fn options(state: web::Data<AppState>) -> HttpResponse {
    let store = state.store.as_ref();

    let months = match queries::list_available_months(store).await {
        Ok(months) => months,
        Err(e) => return error_response("list months", &e),
    };
    let districts = match queries::list_available_districts(store).await {
        Ok(districts) => districts,
        Err(e) => return error_response("list districts", &e),
    };

    HttpResponse::Ok().json(ApiOptions {
        default_range: DateRange::spanning_months(&months),
        months,
        districts: districts.into_iter().collect(),
    })
}

/// `GET /api/offenses`
///
/// Monthly offense and shooting counts with their mean lines.
pub async fn offenses(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let store = state.store.as_ref();

    let filter = match resolve_filter(store, &params).await {
        Ok(filter) => filter,
        Err(e) => return dashboard_error_response("build filter", &e),
    };

    match queries::offense_series(store, &filter).await {
        Ok(series) => HttpResponse::Ok().json(ApiOffenses {
            columns: series.columns(),
            summary: series.summary(),
        }),
        Err(e) => error_response("query offense series", &e),
    }
}

/// `GET /api/top-categories`
///
/// The most frequent offense categories, `limit` rows (default 10).
pub async fn top_categories(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let store = state.store.as_ref();
    let limit = params.limit.unwrap_or(DEFAULT_TOP_LIMIT);

    let filter = match resolve_filter(store, &params).await {
        Ok(filter) => filter,
        Err(e) => return dashboard_error_response("build filter", &e),
    };

    match queries::top_categories(store, &filter, limit).await {
        Ok(top) => HttpResponse::Ok().json(ApiTopCategories {
            columns: top.columns(),
        }),
        Err(e) => error_response("query top categories", &e),
    }
}

/// `GET /api/heatmap`
///
/// Day-of-week by hour counts, Monday first.
pub async fn heatmap(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let store = state.store.as_ref();

    let filter = match resolve_filter(store, &params).await {
        Ok(filter) => filter,
        Err(e) => return dashboard_error_response("build filter", &e),
    };

    match queries::heatmap(store, &filter).await {
        Ok(heatmap) => HttpResponse::Ok().json(ApiHeatmap {
            columns: heatmap.in_canonical_order().columns(),
        }),
        Err(e) => error_response("query heatmap", &e),
    }
}

/// `GET /api/dashboard`
///
/// All three tables for one filter, as a single render state.
pub async fn dashboard(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let store = state.store.as_ref();

    let filter = match resolve_filter(store, &params).await {
        Ok(filter) => filter,
        Err(e) => return dashboard_error_response("build filter", &e),
    };

    match crime_dashboard::render(store, &filter).await {
        Ok(render_state) => HttpResponse::Ok().json(ApiDashboard::from(render_state)),
        Err(e) => dashboard_error_response("render dashboard", &e),
    }
}
