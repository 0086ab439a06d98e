use crate::models::MessageRef;
use crate::poll::ResultsReloader;
use log::{info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Forwards reload requests to the worker without waiting on it.
#[derive(Clone)]
pub struct ChannelReloader {
    sender: UnboundedSender<MessageRef>,
}

impl ResultsReloader for ChannelReloader {
    fn request_results_reload(&self, context: MessageRef) {
        if self.sender.send(context).is_err() {
            warn!("Reload worker has stopped; dropping reload request for {}", context);
        }
    }
}

pub fn reload_channel() -> (ChannelReloader, UnboundedReceiver<MessageRef>) {
    let (sender, receiver) = unbounded_channel();
    (ChannelReloader { sender }, receiver)
}

/// Drains reload requests until every sender is gone. Returns how many were handled.
pub async fn run_reload_worker(mut receiver: UnboundedReceiver<MessageRef>) -> usize {
    info!("Starting results reload worker...");
    let mut handled = 0;
    while let Some(context) = receiver.recv().await {
        handled += 1;
        info!("Reloading poll results for message {}", context);
    }
    info!("Reload worker finished after {} request(s).", handled);
    handled
}
