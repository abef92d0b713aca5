/**
 * SÉQUENCE PORTONS - Cycle temporisé des servomoteurs SG90
 *
 * RÔLE : Dérouler le cycle complet closed → opening → open → closing → closed
 * avec les temporisations du matériel (2s ouverture, 4s maintien, 2s fermeture)
 * et publier un snapshot à chaque phase.
 *
 * La transition est une fonction pure (phase courante → phase suivante + délai),
 * le pilote asynchrone ne fait que l'appliquer - le cycle se teste sans temps réel.
 */
use rand::Rng;
use rumqttc::AsyncClient;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;

use crate::models::{GateKind, GatePhase};
use crate::publisher::{self, MqttPublisher};
use crate::state::{ParkingState, Shared};

const OPENING_SECS: u64 = 2;
const OPEN_HOLD_SECS: u64 = 4;
const CLOSING_SECS: u64 = 2;

impl GatePhase {
    /// Prochaine étape du cycle temporisé : phase suivante et délai à
    /// respecter dans cette phase avant la transition d'après.
    pub fn next_in_cycle(self) -> (GatePhase, Duration) {
        match self {
            GatePhase::Closed => (GatePhase::Opening, Duration::from_secs(OPENING_SECS)),
            GatePhase::Opening => (GatePhase::Open, Duration::from_secs(OPEN_HOLD_SECS)),
            GatePhase::Open => (GatePhase::Closing, Duration::from_secs(CLOSING_SECS)),
            GatePhase::Closing => (GatePhase::Closed, Duration::ZERO),
        }
    }
}

/// Déroule un cycle complet pour un porton, snapshot publié à chaque phase.
/// Le timer d'un porton n'interfère pas avec les ticks statistiques : les
/// deux mutent des champs disjoints de l'agrégat.
pub async fn run_gate_cycle<C: MqttPublisher>(state: Shared<ParkingState>, client: C, kind: GateKind) {
    let mut phase = { state.lock().gate_phase(kind) };
    loop {
        let (next, dwell) = phase.next_in_cycle();
        phase = next;
        let payload = {
            let mut st = state.lock();
            st.set_gate_phase(kind, phase, OffsetDateTime::now_utc());
            st.gate_payload(kind, Some(phase.action_label()))
        };
        publisher::publish_gate(&client, kind, &payload).await;
        println!(
            "[gates] {} -> {} (servo {}°)",
            kind.as_str(),
            phase.action_label(),
            phase.servo_angle()
        );
        if phase == GatePhase::Closed {
            break;
        }
        tokio::time::sleep(dwell).await;
    }
}

/// Intervalle du déclencheur de séquences simulées.
const ACTIVITY_SECS: u64 = 8;
/// Probabilité qu'un tick déclenche un cycle.
const ACTIVITY_PROBABILITY: f64 = 0.2;

/// Déclencheur périodique des séquences simulées (config `simulate_gates`).
/// Un cycle ne démarre que si le porton tiré est au repos (closed).
pub fn spawn_gate_activity(state: Shared<ParkingState>, client: AsyncClient) {
    task::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(ACTIVITY_SECS));
        loop {
            tick.tick().await;
            let (fire, kind) = {
                let mut rng = rand::thread_rng();
                let kind = if rng.gen_bool(0.5) {
                    GateKind::Entry
                } else {
                    GateKind::Exit
                };
                (rng.gen_bool(ACTIVITY_PROBABILITY), kind)
            };
            if !fire || state.lock().gate_phase(kind) != GatePhase::Closed {
                continue;
            }
            println!("[gates] séquence simulée pour le porton {}", kind.as_str());
            task::spawn(run_gate_cycle(state.clone(), client.clone(), kind));
        }
    });
}
