use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use common_http_errors::ApiResult;
use futures_util::stream::{self, Stream};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::extractors::TenantCtxExtractor;
use crate::incidents::IncidentError;

/// Per-incident realtime stream: polls the incident row and its timeline on
/// a fixed interval, emitting a typed `Event` (`.event("...")`) per change
/// so a standard `EventSource` client can dispatch on event type. `KeepAlive`
/// supplies the `:`-prefixed heartbeat comment lines the wire format
/// requires between real frames, independent of our own heartbeat comments.
pub async fn stream_incident(
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(incident_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let incident = crate::db::incidents::get(&state.pool, &ctx, incident_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;
    let timeline = crate::db::incidents::list_timeline(&state.pool, &ctx, incident_id)
        .await
        .map_err(|e| e.into_api_error(ctx.trace_id))?;

    state
        .metrics
        .realtime_streams_open
        .with_label_values(&[&ctx.tenant_id.to_string()])
        .inc();

    let poll_interval = Duration::from_millis(state.realtime_poll_ms());
    let metrics = state.metrics.clone();
    let tenant_id = ctx.tenant_id;

    let mut pending = VecDeque::new();
    pending.push_back(
        Event::default()
            .event("connected")
            .data(serde_json::json!({"incidentId": incident_id}).to_string()),
    );

    let connection = Connection {
        pool: state.pool.clone(),
        ctx,
        incident_id,
        last_updated_at: incident.updated_at,
        last_event_count: timeline.len(),
        pending,
        closed: false,
    };

    let events = stream::unfold(connection, move |mut connection| {
        let poll_interval = poll_interval;
        async move {
            if let Some(event) = connection.pending.pop_front() {
                return Some((Ok(event), connection));
            }
            if connection.closed {
                return None;
            }

            tokio::time::sleep(poll_interval).await;

            match poll_once(&connection.pool, &connection.ctx, connection.incident_id).await {
                Err(IncidentError::NotFound) => {
                    connection.pending.push_back(Event::default().event("deleted").data("{}"));
                    connection.closed = true;
                }
                Err(_) => {
                    connection.pending.push_back(Event::default().comment("poll error"));
                }
                Ok((incident, timeline)) => {
                    let mut emitted = false;
                    if incident.updated_at > connection.last_updated_at {
                        let payload = serde_json::json!({
                            "status": incident.status,
                            "severity": incident.severity,
                            "assignee": incident.assignee_id,
                            "updated_at": incident.updated_at,
                        });
                        connection.pending.push_back(
                            Event::default().event("incident_updated").data(payload.to_string()),
                        );
                        connection.last_updated_at = incident.updated_at;
                        emitted = true;
                    }
                    if timeline.len() > connection.last_event_count {
                        let new_count = timeline.len() - connection.last_event_count;
                        let new_events: Vec<_> = timeline.iter().take(new_count).collect();
                        let payload = serde_json::json!({"newEvents": new_events});
                        connection.pending.push_back(
                            Event::default().event("timeline_updated").data(payload.to_string()),
                        );
                        connection.last_event_count = timeline.len();
                        emitted = true;
                    }
                    if !emitted {
                        connection.pending.push_back(Event::default().comment("heartbeat"));
                    }
                }
            }

            let event = connection
                .pending
                .pop_front()
                .expect("at least one event was queued by the poll above");
            Some((Ok(event), connection))
        }
    });

    // Dropping the stream (client disconnect) releases the gauge slot.
    let guarded = GaugeGuardStream { inner: events, metrics, tenant_id };

    Ok(Sse::new(guarded).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("heartbeat")))
}

struct Connection {
    pool: sqlx::PgPool,
    ctx: common_security::TenantContext,
    incident_id: Uuid,
    last_updated_at: chrono::DateTime<chrono::Utc>,
    last_event_count: usize,
    pending: VecDeque<Event>,
    closed: bool,
}

type PollResult = Result<(crate::db::incidents::Incident, Vec<crate::db::incidents::TimelineEvent>), IncidentError>;

async fn poll_once(
    pool: &sqlx::PgPool,
    ctx: &common_security::TenantContext,
    incident_id: Uuid,
) -> PollResult {
    let incident = crate::db::incidents::get(pool, ctx, incident_id).await?;
    let timeline = crate::db::incidents::list_timeline(pool, ctx, incident_id).await?;
    Ok((incident, timeline))
}

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use common_observability::ControlPlaneMetrics;

/// Wraps the underlying poll stream so the open-streams gauge is
/// decremented the moment the stream is dropped, however that happens
/// (client disconnect, server shutdown, or natural completion).
struct GaugeGuardStream<S> {
    inner: S,
    metrics: Arc<ControlPlaneMetrics>,
    tenant_id: Uuid,
}

impl<S: Stream + Unpin> Stream for GaugeGuardStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for GaugeGuardStream<S> {
    fn drop(&mut self) {
        self.metrics
            .realtime_streams_open
            .with_label_values(&[&self.tenant_id.to_string()])
            .dec();
    }
}
