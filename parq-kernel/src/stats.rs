/**
 * TICKS PÉRIODIQUES - Agrégation statistique et buckets horaires
 *
 * RÔLE : Publier le résumé système à intervalle fixe, écraser le bucket de
 * l'heure courante, et prendre l'échantillon d'occupation pour la moyenne.
 *
 * Les trois intervalles tirent indépendamment (même tâche, tokio::select!) ;
 * chaque callback court jusqu'au bout sans s'entrelacer avec un autre tick
 * du même type.
 */
use std::time::Duration;
use time::OffsetDateTime;
use tokio::task;
use tokio::time::interval;

use crate::config::TickConfig;
use crate::publisher::{self, MqttPublisher};
use crate::state::{ParkingState, Shared};

pub fn spawn_stats_publisher<C: MqttPublisher + 'static>(
    state: Shared<ParkingState>,
    client: C,
    ticks: TickConfig,
) -> task::JoinHandle<()> {
    task::spawn(async move {
        let mut stats_tick = interval(Duration::from_secs(ticks.stats_secs));
        let mut hourly_tick = interval(Duration::from_secs(ticks.hourly_secs));
        let mut sample_tick = interval(Duration::from_secs(ticks.sample_secs));

        loop {
            tokio::select! {
                _ = stats_tick.tick() => {
                    publisher::publish_stats(&client, &state).await;
                }
                _ = hourly_tick.tick() => {
                    let buckets = { state.lock().update_hourly(OffsetDateTime::now_utc()) };
                    publisher::publish_hourly(&client, &buckets).await;
                    println!("[stats] buckets horaires mis à jour ({} entrées)", buckets.len());
                }
                _ = sample_tick.tick() => {
                    let average = {
                        let mut st = state.lock();
                        st.sample_occupancy();
                        st.average_occupancy_pct()
                    };
                    println!("[stats] échantillon pris, moyenne occupation {average}%");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::new_state;

    #[tokio::test(start_paused = true)]
    async fn sampling_tick_feeds_the_running_mean() {
        let state = new_state(ParkingState::new(3, false, OffsetDateTime::UNIX_EPOCH));
        state
            .lock()
            .apply_occupancy(&[(1, true), (2, true), (3, true)], OffsetDateTime::UNIX_EPOCH);
        let client = parq_devkit::MockMqttClient::new();

        let ticks = TickConfig {
            stats_secs: 3600,
            hourly_secs: 3600,
            sample_secs: 1,
        };
        let handle = spawn_stats_publisher(state.clone(), client.clone(), ticks);

        // laisse passer quelques échantillons en temps virtuel
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.abort();

        assert_eq!(state.lock().average_occupancy_pct(), 100);

        // le premier tick stats part immédiatement sur le backbone
        let stats: serde_json::Value = client
            .get_last_json_message(publisher::TOPIC_STATS_SUMMARY)
            .unwrap()
            .unwrap();
        assert_eq!(stats["totalSpaces"], 3);
        assert_eq!(stats["occupiedSpaces"], 3);
    }
}
