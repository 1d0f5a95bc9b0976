use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rutero_core::error::CoreError;
use rutero_core::repository::RouteTemplateRepository;
use rutero_core::route::RouteTemplate;

use crate::calendar::should_generate;
use crate::factory::TripFactory;

#[derive(Debug, Clone, Serialize)]
pub struct DateError {
    pub date: NaiveDate,
    pub error: String,
}

/// Outcome of expanding one route template over its window.
#[derive(Debug, Clone, Serialize)]
pub struct RouteExpansionReport {
    pub route_template_id: Uuid,
    pub route_name: String,
    pub created: usize,
    pub skipped_existing: usize,
    pub errors: Vec<DateError>,
    pub watermark: Option<NaiveDate>,
}

impl RouteExpansionReport {
    fn for_route(route: &RouteTemplate) -> Self {
        Self {
            route_template_id: route.id,
            route_name: route.name.clone(),
            created: 0,
            skipped_existing: 0,
            errors: Vec::new(),
            watermark: route.last_generated,
        }
    }
}

/// Aggregate over one generation pass.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationSummary {
    pub total_created: usize,
    pub reports: Vec<RouteExpansionReport>,
}

impl GenerationSummary {
    pub fn single(report: RouteExpansionReport) -> Self {
        Self {
            total_created: report.created,
            reports: vec![report],
        }
    }
}

/// Walks route templates' date windows and materializes trips through the
/// factory. Incremental: the watermark makes a re-run skip days that were
/// already walked, and factory idempotency covers days a failed run only
/// partially processed.
pub struct ExpansionEngine {
    routes: Arc<dyn RouteTemplateRepository>,
    factory: TripFactory,
}

impl ExpansionEngine {
    pub fn new(routes: Arc<dyn RouteTemplateRepository>, factory: TripFactory) -> Self {
        Self { routes, factory }
    }

    /// Expands every active template. Per-template failures are contained
    /// in the summary; only systemic storage failures propagate.
    pub async fn expand_all(&self, today: NaiveDate) -> Result<GenerationSummary, CoreError> {
        let templates = self.routes.list_active().await?;
        let mut summary = GenerationSummary {
            total_created: 0,
            reports: Vec::with_capacity(templates.len()),
        };

        for route in &templates {
            match self.expand_route(route, today).await {
                Ok(report) => {
                    summary.total_created += report.created;
                    summary.reports.push(report);
                }
                Err(err @ CoreError::Storage(_)) => return Err(err),
                Err(err) => {
                    warn!(route = %route.name, error = %err, "route expansion failed");
                    let mut report = RouteExpansionReport::for_route(route);
                    report.errors.push(DateError {
                        date: today,
                        error: err.to_string(),
                    });
                    summary.reports.push(report);
                }
            }
        }

        info!(
            routes = summary.reports.len(),
            created = summary.total_created,
            "generation pass complete"
        );
        Ok(summary)
    }

    pub async fn expand_route(
        &self,
        route: &RouteTemplate,
        today: NaiveDate,
    ) -> Result<RouteExpansionReport, CoreError> {
        let rule = &route.recurrence;
        let window_end = today + Duration::days(i64::from(rule.horizon_days));

        // Window start: the latest of today, the rule's start date, and the
        // day after the watermark. Re-runs never re-walk generated days.
        let mut window_start = today;
        if let Some(start) = rule.start_date {
            window_start = window_start.max(start);
        }
        if let Some(mark) = route.last_generated {
            if let Some(next) = mark.succ_opt() {
                window_start = window_start.max(next);
            }
        }

        let mut report = RouteExpansionReport::for_route(route);
        if window_start > window_end {
            debug!(route = %route.name, "already up to date, nothing to generate");
            return Ok(report);
        }

        let mut date = window_start;
        loop {
            if should_generate(rule, date) {
                match self.factory.create_trip_instance(route, date).await {
                    Ok(outcome) if outcome.created => report.created += 1,
                    Ok(_) => report.skipped_existing += 1,
                    Err(err @ CoreError::Storage(_)) => return Err(err),
                    Err(err) => {
                        warn!(route = %route.name, %date, error = %err, "trip generation failed");
                        report.errors.push(DateError {
                            date,
                            error: err.to_string(),
                        });
                    }
                }
            }
            if date >= window_end {
                break;
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        // Watermark advances only on progress; a pass that created nothing
        // must not mask a misconfigured rule.
        if report.created > 0 {
            self.routes.advance_watermark(route.id, window_end).await?;
            report.watermark = Some(window_end);
        }

        info!(
            route = %route.name,
            created = report.created,
            skipped = report.skipped_existing,
            errors = report.errors.len(),
            "route expansion finished"
        );
        Ok(report)
    }
}
