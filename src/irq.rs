//! The transceiver interrupt line
//!
//! The DW1000 signals the host through a single line that goes high when an
//! enabled event is pending. The host sees it as a rising edge on a GPIO pin,
//! routed through an edge detector (EXTI on STM32, GPIOTE on nRF52) to a line
//! of the interrupt controller.
//!
//! [`IrqLine`] owns that path. Its state lives in an [`EdgeLatch`], which the
//! interrupt handler shares as a `static`. The mask bit in the interrupt
//! controller is what decides whether the line is live; the latch only
//! records what happened while it was.
//!
//! The interrupt handler calls [`EdgeLatch::on_edge`], which masks the line
//! and records the edge. It doesn't talk to the transceiver. Foreground code
//! notices the pending edge, reads the cause over SPI, calls
//! [`IrqLine::service`] and re-arms. The line is never re-armed
//! automatically, so a transceiver that holds the line high until it is
//! serviced can't cause an interrupt storm.
//!
//! All foreground writes to the latch happen while the line is masked, which
//! is the critical section between foreground and handler.

use core::sync::atomic::{compiler_fence, AtomicU8, Ordering};

use crate::{error::Violation, reset::ResetPinState};


/// Lowest preemption priority with 16 priority groups
///
/// The transceiver line runs at this priority, so that it never preempts
/// system tick or other time-critical handlers.
pub const LOWEST_PRIORITY: u8 = 15;


/// The interrupt controller, as provided by the board
pub trait InterruptController {
    /// Identifies a line of the controller
    type Line: Copy;

    /// Mask a line, preventing its handler from running
    fn mask(&mut self, line: Self::Line);

    /// Unmask a line
    fn unmask(&mut self, line: Self::Line);

    /// Clear the pending bit of a line
    fn unpend(&mut self, line: Self::Line);

    /// Whether a line is unmasked
    fn is_enabled(&self, line: Self::Line) -> bool;

    /// Set the priority of a line
    fn set_priority(&mut self, line: Self::Line, priority: u8);
}

/// The edge detector in front of the interrupt controller
pub trait EdgeInput {
    /// Configure the pin as an input and generate events on an edge
    fn listen(&mut self, edge: Edge, pull: Pull);

    /// Stop generating events
    fn unlisten(&mut self);

    /// Clear an event latched by the edge detector
    fn clear_event(&mut self);
}

/// Edge that generates an event
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edge {
    /// Low to high
    Rising,
    /// High to low
    Falling,
}

/// Input pull resistor
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Pull {
    /// Floating
    None,
    /// Pull-down
    Down,
    /// Pull-up
    Up,
}


/// The state of the interrupt line
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineState {
    /// Masked, edges are ignored
    Disabled,

    /// Unmasked, waiting for an edge
    ArmedWaitingEdge,

    /// An edge was recorded; the line is masked until it is serviced
    Pending,

    /// The recorded edge was serviced; the line stays masked until re-armed
    Serviced,
}

impl LineState {
    fn from_bits(bits: u8) -> Self {
        match bits {
            1 => LineState::ArmedWaitingEdge,
            2 => LineState::Pending,
            3 => LineState::Serviced,
            _ => LineState::Disabled,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            LineState::Disabled => 0,
            LineState::ArmedWaitingEdge => 1,
            LineState::Pending => 2,
            LineState::Serviced => 3,
        }
    }
}


/// Records edges, shared between foreground and interrupt handler
///
/// Only uses atomic loads and stores, so it works on cores without
/// compare-and-swap.
pub struct EdgeLatch(AtomicU8);

impl EdgeLatch {
    /// Create a latch in [`LineState::Disabled`]
    pub const fn new() -> Self {
        EdgeLatch(AtomicU8::new(0))
    }

    /// The recorded state
    ///
    /// This doesn't consult the interrupt controller. Use
    /// [`IrqLine::state`] for the effective state.
    pub fn recorded(&self) -> LineState {
        LineState::from_bits(self.0.load(Ordering::SeqCst))
    }

    /// Whether an edge is waiting to be serviced
    pub fn is_pending(&self) -> bool {
        self.recorded() == LineState::Pending
    }

    /// Handle an edge, from the interrupt handler
    ///
    /// If the line is armed, masks it and records the edge. Otherwise the
    /// edge is ignored. Returns whether the edge was recorded.
    pub fn on_edge<C>(&self, controller: &mut C, line: C::Line) -> bool
    where
        C: InterruptController,
    {
        if self.recorded() != LineState::ArmedWaitingEdge {
            return false;
        }

        controller.mask(line);
        self.store(LineState::Pending);

        true
    }

    fn store(&self, state: LineState) {
        self.0.store(state.to_bits(), Ordering::SeqCst);
        // Keep the store ahead of the MMIO write that follows it.
        compiler_fence(Ordering::SeqCst);
    }
}

impl Default for EdgeLatch {
    fn default() -> Self {
        Self::new()
    }
}


/// Manages the transceiver interrupt line
pub struct IrqLine<'l, C, P>
where
    C: InterruptController,
{
    controller: C,
    line: C::Line,
    input: P,
    latch: &'l EdgeLatch,
    priority: u8,
}

impl<'l, C, P> IrqLine<'l, C, P>
where
    C: InterruptController,
    P: EdgeInput,
{
    /// Take over the interrupt line
    ///
    /// The line is disarmed right away, whatever state the hardware was in.
    pub fn new(controller: C, line: C::Line, input: P, latch: &'l EdgeLatch, priority: u8) -> Self {
        let mut irq = IrqLine {
            controller,
            line,
            input,
            latch,
            priority,
        };
        irq.disarm();

        irq
    }

    /// Arm the line for the next rising edge
    ///
    /// Rejected without any effect if the reset pin isn't tri-stated, or if
    /// an edge is still pending. Arming an armed line does nothing.
    pub fn arm(&mut self, reset_pin: ResetPinState) -> Result<(), Violation> {
        if reset_pin != ResetPinState::TriStatedInput {
            log::warn!("not arming transceiver irq, reset pin is driven");
            return Err(Violation::ResetPinDriven);
        }

        match self.state() {
            LineState::ArmedWaitingEdge => return Ok(()),
            LineState::Pending => {
                log::warn!("not arming transceiver irq, edge not serviced");
                return Err(Violation::EdgeNotServiced);
            }
            LineState::Disabled | LineState::Serviced => {}
        }

        self.controller.mask(self.line);

        self.input.listen(Edge::Rising, Pull::Down);
        self.input.clear_event();
        self.controller.unpend(self.line);
        self.controller.set_priority(self.line, self.priority);

        self.latch.store(LineState::ArmedWaitingEdge);
        self.controller.unmask(self.line);

        log::debug!("transceiver irq armed");

        Ok(())
    }

    /// Disarm the line
    ///
    /// Masks the line first, then stops edge detection and drops anything
    /// latched. Valid in every state.
    pub fn disarm(&mut self) {
        self.controller.mask(self.line);

        self.input.unlisten();
        self.input.clear_event();
        self.controller.unpend(self.line);

        self.latch.store(LineState::Disabled);
    }

    /// Whether the line is unmasked at the interrupt controller
    pub fn is_armed(&self) -> bool {
        self.controller.is_enabled(self.line)
    }

    /// The effective state of the line
    ///
    /// An armed latch on a line that is masked at the controller reads as
    /// [`LineState::Disabled`], as no edge can be delivered.
    pub fn state(&self) -> LineState {
        match self.latch.recorded() {
            LineState::ArmedWaitingEdge if !self.is_armed() => LineState::Disabled,
            state => state,
        }
    }

    /// Handle an edge from foreground code
    ///
    /// Does what the interrupt handler does, for boards that poll the edge
    /// detector instead of taking the interrupt.
    pub fn on_edge(&mut self) -> bool {
        let recorded = self.latch.on_edge(&mut self.controller, self.line);
        self.input.clear_event();

        recorded
    }

    /// Mark a pending edge as serviced
    ///
    /// Call this after the interrupt cause was read from the transceiver.
    /// Returns whether there was a pending edge.
    pub fn service(&mut self) -> bool {
        if !self.latch.is_pending() {
            return false;
        }

        self.latch.store(LineState::Serviced);

        true
    }

    /// The latch this line records into
    pub fn latch(&self) -> &'l EdgeLatch {
        self.latch
    }

    /// Release the interrupt controller and edge detector
    ///
    /// The line is disarmed first.
    pub fn free(mut self) -> (C, P) {
        self.disarm();
        (self.controller, self.input)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    struct Nvic {
        enabled: bool,
        masks: u32,
    }

    impl InterruptController for Nvic {
        type Line = ();

        fn mask(&mut self, _: ()) {
            self.enabled = false;
            self.masks += 1;
        }

        fn unmask(&mut self, _: ()) {
            self.enabled = true;
        }

        fn unpend(&mut self, _: ()) {}

        fn is_enabled(&self, _: ()) -> bool {
            self.enabled
        }

        fn set_priority(&mut self, _: (), _: u8) {}
    }

    #[test]
    fn latch_starts_disabled() {
        let latch = EdgeLatch::new();
        assert_eq!(latch.recorded(), LineState::Disabled);
    }

    #[test]
    fn latch_ignores_edge_unless_armed() {
        let mut nvic = Nvic {
            enabled: true,
            masks: 0,
        };

        for state in [LineState::Disabled, LineState::Pending, LineState::Serviced] {
            let latch = EdgeLatch::new();
            latch.store(state);

            assert!(!latch.on_edge(&mut nvic, ()));
            assert_eq!(latch.recorded(), state);
        }
        assert_eq!(nvic.masks, 0);
    }

    #[test]
    fn latch_masks_on_recorded_edge() {
        let mut nvic = Nvic {
            enabled: true,
            masks: 0,
        };
        let latch = EdgeLatch::new();
        latch.store(LineState::ArmedWaitingEdge);

        assert!(latch.on_edge(&mut nvic, ()));
        assert!(latch.is_pending());
        assert!(!nvic.enabled);

        // A second edge before servicing isn't counted again.
        assert!(!latch.on_edge(&mut nvic, ()));
        assert_eq!(nvic.masks, 1);
    }
}
