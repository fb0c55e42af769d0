//! Server-Sent Events fuer Plugin-Lifecycle-Ereignisse
//!
//! Jeder Abonnent erhaelt einen eigenen Empfaenger am Event-Bus. Der
//! Ereignisname steht in der `event:`-Zeile, das Ereignis als JSON in
//! `data:`.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use plugwerk_core::SystemEreignis;

use crate::rest::ApiZustand;

/// `GET /api/v1/plugins/ereignisse`
pub async fn ereignisse(
    State(zustand): State<ApiZustand>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let empfaenger = zustand.bus.abonnieren();
    let strom = stream::unfold(empfaenger, |mut empfaenger| async move {
        let ereignis = empfaenger.empfangen().await?;
        Some((Ok(sse_event(&ereignis)), empfaenger))
    });
    Sse::new(strom).keep_alive(KeepAlive::default())
}

fn sse_event(ereignis: &SystemEreignis) -> Event {
    let event = Event::default().event(ereignis.name());
    match event.json_data(ereignis) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(fehler = %e, "Ereignis nicht serialisierbar");
            Event::default().comment("ereignis verworfen")
        }
    }
}

