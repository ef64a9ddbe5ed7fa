use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::{Config, GeocoderKind};
use crate::geo::GeoPoint;
use crate::models::booking::{Booking, BookingEvent, BookingEventKind};
use crate::notify::{LogNotifier, NotificationJob, Notifier, TemplateContext};
use crate::observability::metrics::Metrics;
use crate::pricing::PricingCatalog;
use crate::routing::{Geocoder, MockGeocoder, RouteParams};
use crate::store::BookingStore;

pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub catalog: PricingCatalog,
    /// `None` when geocoding is switched off.
    pub geocoder: Option<Arc<dyn Geocoder>>,
    pub route_params: RouteParams,
    /// Route start; when unset, routes start at their first located stop.
    pub depot: Option<GeoPoint>,
    pub notifier: Arc<dyn Notifier>,
    pub templates: TemplateContext,
    pub notification_tx: mpsc::Sender<NotificationJob>,
    pub booking_events_tx: broadcast::Sender<BookingEvent>,
    pub metrics: Metrics,
    pub static_dir: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        config: &Config,
    ) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (notification_tx, notification_rx) = mpsc::channel(config.notification_queue_size);
        let (booking_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let geocoder: Option<Arc<dyn Geocoder>> = match config.geocoder {
            GeocoderKind::Mock => Some(Arc::new(MockGeocoder::seattle())),
            GeocoderKind::Disabled => None,
        };

        (
            Self {
                store,
                catalog: PricingCatalog::standard(),
                geocoder,
                route_params: config.route_params,
                depot: config.depot,
                notifier: Arc::new(LogNotifier),
                templates: TemplateContext::new(
                    config.business_name.clone(),
                    config.tracking_url.clone(),
                ),
                notification_tx,
                booking_events_tx,
                metrics: Metrics::new(),
                static_dir: config.static_dir.clone(),
            },
            notification_rx,
        )
    }

    /// Publishes to WebSocket subscribers. Having none is the idle state,
    /// so a failed send is dropped.
    pub fn emit_event(&self, kind: BookingEventKind, booking: &Booking) {
        let _ = self.booking_events_tx.send(BookingEvent::new(kind, booking));
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}
