use crossbeam_channel::Sender;

/// The two bulk endpoints of the mass storage interface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Device to host
    BulkIn,
    /// Host to device
    BulkOut,
}

/// One wire transfer. The buffer travels with the request and comes back in
/// the matching [`Completion`].
#[derive(Debug)]
pub struct TransferRequest {
    /// Buffer slot the request belongs to, echoed in the completion
    pub slot: usize,
    pub buf: Vec<u8>,
    /// Bytes to send (IN) or the most the host may send (OUT)
    pub length: usize,
    /// IN only: terminate with a zero length packet if `length` is a multiple
    /// of the max packet size
    pub zero: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    /// Dequeued before it finished
    Cancelled,
    Error,
}

#[derive(Debug)]
pub struct Completion {
    pub ep: Endpoint,
    pub slot: usize,
    pub buf: Vec<u8>,
    /// Bytes actually moved
    pub actual: usize,
    pub status: TransferStatus,
}

/// Where endpoint completions are delivered. Cheap to clone; safe to use from
/// any thread, including interrupt-ish completion context.
#[derive(Clone)]
pub struct CompletionSink {
    tx: Sender<Completion>,
}

impl CompletionSink {
    pub(crate) fn new(tx: Sender<Completion>) -> Self {
        CompletionSink { tx }
    }

    pub fn complete(&self, completion: Completion) {
        if let Err(e) = self.tx.send(completion) {
            log::warn!("completion for slot {} dropped, engine is gone", e.into_inner().slot);
        }
    }
}

/// The controller specific endpoint layer.
///
/// Every request accepted by `enqueue` must eventually be handed back through
/// the attached [`CompletionSink`], including requests removed with `dequeue`.
pub trait UsbEndpoints: Send {
    /// Called once at bind, before any other method
    fn attach(&mut self, sink: CompletionSink);

    fn enable(&mut self, ep: Endpoint, max_packet_size: usize);
    fn disable(&mut self, ep: Endpoint);

    /// Queue a transfer. A request the endpoint can't take is handed back
    /// untouched.
    fn enqueue(&mut self, ep: Endpoint, req: TransferRequest) -> Result<(), TransferRequest>;
    /// Cancel the request queued from `slot`, if it is still outstanding
    fn dequeue(&mut self, ep: Endpoint, slot: usize);

    fn set_halt(&mut self, ep: Endpoint);
    fn clear_halt(&mut self, ep: Endpoint);

    /// True if the controller can end an IN data phase early with a short
    /// packet instead of padding out to the length the host asked for
    fn supports_short_in(&self) -> bool {
        false
    }

    /// Complete the status stage of the pending bulk only reset
    fn ack_control(&mut self);
}
