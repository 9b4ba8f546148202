use embassy_time::{Duration, Instant, Ticker};

use super::{BoardReceiver, CONFIG};
use crate::clock::FirmwareInstant;
use crate::hw::UserButton;

#[embassy_executor::task]
pub async fn run(mut receiver: BoardReceiver, button: UserButton<'static>) -> ! {
    let period = Duration::from_micros(CONFIG.service_period().as_micros() as u64);
    let mut ticker = Ticker::every(period);

    loop {
        ticker.next().await;
        let now = FirmwareInstant::from(Instant::now());
        receiver.service(now, button.is_pressed());
    }
}
