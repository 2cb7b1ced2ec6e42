mod common;

use proptest::prelude::*;

use dw1000_port::{BusRate, EdgeLatch, LineState, ResetPinState, Role, Violation};

use self::common::{Board, Delay, Event};


#[derive(Clone, Copy, Debug)]
enum Op {
    Arm,
    Disarm,
    Interrupt,
    Service,
    Reset,
    BringUpRate,
    OperationalRate,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Arm),
        Just(Op::Disarm),
        Just(Op::Interrupt),
        Just(Op::Service),
        Just(Op::Reset),
        Just(Op::BringUpRate),
        Just(Op::OperationalRate),
    ]
}

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Initiator), Just(Role::Responder)]
}


proptest! {
    #[test]
    fn line_follows_its_state_machine(
        role in role(),
        ops in proptest::collection::vec(op(), 0..40),
    ) {
        let board = Board::new();
        let latch = EdgeLatch::new();
        let mut port = board.port(role, &latch);

        let mut expected = LineState::Disabled;
        let mut rate = BusRate::BringUp;

        for op in ops {
            board.clear();

            match op {
                Op::Arm => {
                    let result = port.arm();

                    if expected == LineState::Pending {
                        prop_assert_eq!(result, Err(Violation::EdgeNotServiced));
                    } else {
                        prop_assert_eq!(result, Ok(()));
                        expected = LineState::ArmedWaitingEdge;
                    }
                }
                Op::Disarm => {
                    port.disarm();
                    expected = LineState::Disabled;
                }
                Op::Interrupt => {
                    let recorded = board.interrupt(&latch);

                    prop_assert_eq!(recorded, expected == LineState::ArmedWaitingEdge);
                    if recorded {
                        expected = LineState::Pending;
                    }
                }
                Op::Service => {
                    let serviced = port.service_irq();

                    prop_assert_eq!(serviced, expected == LineState::Pending);
                    if serviced {
                        expected = LineState::Serviced;
                    }
                }
                Op::Reset => {
                    prop_assert!(port.reset_transceiver(&mut Delay(board.clone())).is_ok());
                    expected = LineState::Disabled;

                    let events = board.events();
                    let driven = events.iter().position(|event| *event == Event::RstLow);
                    prop_assert_eq!(events.first(), Some(&Event::Mask));
                    prop_assert!(driven.is_some());
                    prop_assert!(!events.contains(&Event::Unmask));
                }
                Op::BringUpRate => {
                    port.set_bring_up_rate();
                    rate = BusRate::BringUp;
                }
                Op::OperationalRate => {
                    port.set_operational_rate();
                    rate = BusRate::Operational;
                }
            }

            prop_assert_eq!(port.irq_state(), expected);
            prop_assert_eq!(port.is_armed(), expected == LineState::ArmedWaitingEdge);
            prop_assert_eq!(port.reset_pin_state(), ResetPinState::TriStatedInput);
            prop_assert_eq!(port.bus_rate(), rate);
            prop_assert!(!board.events().iter().any(Event::is_spi_transaction));
        }
    }
}
