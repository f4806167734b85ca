//! Integration tests for the ledger engine
//!
//! Covers minting, transfers, operator approval, the receiver handshake,
//! atomic rollback, reentrancy and the RocksDB-backed store.

use chord_ledger::{
    AcceptingReceiver, AccountKind, Address, FailingReceiver, Ledger, LedgerConfig, LedgerDb,
    LedgerError, LedgerEvent, Quantity, ReceiverError, RejectingReceiver, TokenId, TokenReceiver,
    BATCH_RECEIVED_SELECTOR, RECEIVED_SELECTOR, U256,
};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

const URI: &str = "https://token-cdn-domain/{id}.json";

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

fn owner() -> Address {
    addr(0xaa)
}

fn u1() -> Address {
    addr(0x01)
}

fn u2() -> Address {
    addr(0x02)
}

fn q(v: u64) -> U256 {
    U256::from(v)
}

fn ids(values: &[u64]) -> Vec<TokenId> {
    values.iter().map(|v| U256::from(*v)).collect()
}

fn new_ledger() -> Ledger {
    Ledger::new(LedgerConfig::new(owner(), URI))
}

// =============================================================================
// Reference scenarios
// =============================================================================

mod scenarios {
    use super::*;

    #[test]
    fn mint_single() {
        let ledger = new_ledger();
        let receipt = ledger.mint(owner(), owner(), q(0), q(10), b"").unwrap();

        assert_eq!(ledger.balance_of(&owner(), &q(0)).unwrap(), q(10));
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(
            receipt.event(),
            Some(&LedgerEvent::Minted {
                operator: owner(),
                to: owner(),
                id: q(0),
                amount: q(10),
            })
        );
        assert_eq!(receipt.ledger, ledger.address());
    }

    #[test]
    fn mint_batch() {
        let ledger = new_ledger();
        let classes = ids(&[0, 1, 2, 3, 4, 5]);
        let amounts = ids(&[1, 2, 3, 4, 5, 6]);
        let receipt = ledger
            .mint_batch(owner(), owner(), classes.clone(), amounts.clone(), b"")
            .unwrap();

        for (id, amount) in classes.iter().zip(&amounts) {
            assert_eq!(ledger.balance_of(&owner(), id).unwrap(), *amount);
        }
        assert_eq!(
            receipt.events,
            vec![LedgerEvent::MintedBatch {
                operator: owner(),
                to: owner(),
                ids: classes,
                amounts,
            }]
        );
    }

    #[test]
    fn transfer_after_batch_mint() {
        let ledger = new_ledger();
        ledger
            .mint_batch(owner(), owner(), ids(&[0, 1, 2, 3, 4, 5]), ids(&[1, 2, 3, 4, 5, 6]), b"")
            .unwrap();

        let receipt = ledger
            .safe_transfer_from(owner(), owner(), u1(), q(0), q(1), b"")
            .unwrap();

        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(1));
        assert_eq!(ledger.balance_of(&owner(), &q(0)).unwrap(), q(0));
        assert_eq!(
            receipt.event(),
            Some(&LedgerEvent::Transferred {
                operator: owner(),
                from: owner(),
                to: u1(),
                id: q(0),
                amount: q(1),
            })
        );
    }

    #[test]
    fn mint_by_non_owner_fails() {
        let ledger = new_ledger();
        let err = ledger.mint(u1(), u1(), q(0), q(10), b"").unwrap_err();

        assert!(matches!(err, LedgerError::NotOwner { caller } if caller == u1()));
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(0));
        assert_eq!(ledger.total_supply(&q(0)).unwrap(), q(0));
    }

    #[test]
    fn batch_transfer_with_empty_class_fails() {
        let ledger = new_ledger();
        ledger
            .mint_batch(owner(), owner(), ids(&[0, 1, 2]), ids(&[1, 5, 5]), b"")
            .unwrap();
        ledger
            .safe_transfer_from(owner(), owner(), u2(), q(0), q(1), b"")
            .unwrap();

        let err = ledger
            .safe_batch_transfer_from(owner(), owner(), u1(), ids(&[0, 1, 2]), ids(&[2, 3, 4]), b"")
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        for id in ids(&[0, 1, 2]) {
            assert_eq!(ledger.balance_of(&u1(), &id).unwrap(), q(0));
        }
    }

    #[test]
    fn balance_of_batch_length_mismatch() {
        let ledger = new_ledger();
        let err = ledger.balance_of_batch(&[owner()], &ids(&[0, 1])).unwrap_err();
        assert!(matches!(err, LedgerError::LengthMismatch { left: 1, right: 2 }));
    }
}

// =============================================================================
// Queries
// =============================================================================

mod queries {
    use super::*;

    #[test]
    fn zero_address_balance_is_invalid() {
        let ledger = new_ledger();
        assert!(matches!(
            ledger.balance_of(&Address::ZERO, &q(0)),
            Err(LedgerError::InvalidAccount)
        ));
        assert!(matches!(
            ledger.balance_of_batch(&[owner(), Address::ZERO], &ids(&[0, 0])),
            Err(LedgerError::InvalidAccount)
        ));
    }

    #[test]
    fn balance_of_batch_preserves_order() {
        let ledger = new_ledger();
        ledger.mint(owner(), u1(), q(7), q(70), b"").unwrap();
        ledger.mint(owner(), u2(), q(8), q(80), b"").unwrap();

        let balances = ledger
            .balance_of_batch(&[u2(), u1(), u1(), u2()], &ids(&[8, 7, 8, 7]))
            .unwrap();
        assert_eq!(balances, vec![q(80), q(70), q(0), q(0)]);
    }

    #[test]
    fn empty_batch_query() {
        let ledger = new_ledger();
        assert!(ledger.balance_of_batch(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn uri_is_shared_by_all_classes() {
        let ledger = new_ledger();
        assert_eq!(ledger.uri(&q(0)), URI);
        assert_eq!(ledger.uri(&q(12345)), URI);
    }

    #[test]
    fn total_supply_follows_mints_not_transfers() {
        let ledger = new_ledger();
        ledger.mint(owner(), u1(), q(3), q(10), b"").unwrap();
        ledger.mint(owner(), u2(), q(3), q(5), b"").unwrap();
        ledger.safe_transfer_from(u1(), u1(), u2(), q(3), q(4), b"").unwrap();

        assert_eq!(ledger.total_supply(&q(3)).unwrap(), q(15));
        assert!(ledger.exists(&q(3)).unwrap());
        assert!(!ledger.exists(&q(4)).unwrap());
    }
}

// =============================================================================
// Minting
// =============================================================================

mod minting {
    use super::*;

    #[test]
    fn mint_to_zero_address() {
        let ledger = new_ledger();
        assert!(matches!(
            ledger.mint(owner(), Address::ZERO, q(0), q(1), b""),
            Err(LedgerError::MintToZeroAddress)
        ));
        assert!(matches!(
            ledger.mint_batch(owner(), Address::ZERO, ids(&[0]), ids(&[1]), b""),
            Err(LedgerError::MintToZeroAddress)
        ));
    }

    #[test]
    fn owner_check_precedes_destination_check() {
        let ledger = new_ledger();
        assert!(matches!(
            ledger.mint(u1(), Address::ZERO, q(0), q(1), b""),
            Err(LedgerError::NotOwner { .. })
        ));
    }

    #[test]
    fn batch_mint_length_mismatch() {
        let ledger = new_ledger();
        assert!(matches!(
            ledger.mint_batch(owner(), u1(), ids(&[0, 1]), ids(&[1]), b""),
            Err(LedgerError::LengthMismatch { left: 2, right: 1 })
        ));
    }

    #[test]
    fn zero_amount_mint_succeeds() {
        let ledger = new_ledger();
        let receipt = ledger.mint(owner(), u1(), q(0), q(0), b"").unwrap();
        assert_eq!(receipt.events.len(), 1);
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(0));
    }

    #[test]
    fn empty_batch_mint_emits_one_event() {
        let ledger = new_ledger();
        let receipt = ledger.mint_batch(owner(), u1(), vec![], vec![], b"").unwrap();
        assert_eq!(
            receipt.events,
            vec![LedgerEvent::MintedBatch {
                operator: owner(),
                to: u1(),
                ids: vec![],
                amounts: vec![],
            }]
        );
    }

    #[test]
    fn repeated_ids_in_batch_mint_accumulate() {
        let ledger = new_ledger();
        ledger
            .mint_batch(owner(), u1(), ids(&[4, 4, 4]), ids(&[1, 2, 3]), b"")
            .unwrap();
        assert_eq!(ledger.balance_of(&u1(), &q(4)).unwrap(), q(6));
        assert_eq!(ledger.total_supply(&q(4)).unwrap(), q(6));
    }

    #[test]
    fn supply_overflow_rolls_back_batch() {
        let ledger = new_ledger();
        ledger.mint(owner(), u1(), q(1), U256::MAX, b"").unwrap();

        let err = ledger
            .mint_batch(owner(), u2(), ids(&[0, 1]), vec![q(5), q(1)], b"")
            .unwrap_err();

        assert!(matches!(err, LedgerError::SupplyOverflow { .. }));
        assert_eq!(ledger.balance_of(&u2(), &q(0)).unwrap(), q(0));
        assert_eq!(ledger.total_supply(&q(0)).unwrap(), q(0));
    }
}

// =============================================================================
// Transfers and operators
// =============================================================================

mod transfers {
    use super::*;

    fn funded() -> Ledger {
        let ledger = new_ledger();
        ledger
            .mint_batch(owner(), u1(), ids(&[0, 1, 2]), ids(&[10, 20, 30]), b"")
            .unwrap();
        ledger
    }

    #[test]
    fn third_party_needs_approval() {
        let ledger = funded();
        let err = ledger
            .safe_transfer_from(u2(), u1(), u2(), q(0), q(1), b"")
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientAllowance { operator, owner } if operator == u2() && owner == u1()
        ));
        assert!(matches!(
            ledger.safe_batch_transfer_from(u2(), u1(), u2(), ids(&[0]), ids(&[1]), b""),
            Err(LedgerError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn approved_operator_can_move_every_class() {
        let ledger = funded();
        let receipt = ledger.set_approval_for_all(u1(), u2(), true).unwrap();
        assert_eq!(
            receipt.event(),
            Some(&LedgerEvent::ApprovalChanged {
                account: u1(),
                operator: u2(),
                approved: true,
            })
        );
        assert!(ledger.is_approved_for_all(&u1(), &u2()).unwrap());
        assert!(!ledger.is_approved_for_all(&u2(), &u1()).unwrap());

        let receipt = ledger
            .safe_batch_transfer_from(u2(), u1(), owner(), ids(&[0, 2]), ids(&[10, 5]), b"")
            .unwrap();
        assert_eq!(
            receipt.event(),
            Some(&LedgerEvent::TransferredBatch {
                operator: u2(),
                from: u1(),
                to: owner(),
                ids: ids(&[0, 2]),
                amounts: ids(&[10, 5]),
            })
        );
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(0));
        assert_eq!(ledger.balance_of(&owner(), &q(2)).unwrap(), q(5));
    }

    #[test]
    fn revoked_operator_is_refused() {
        let ledger = funded();
        ledger.set_approval_for_all(u1(), u2(), true).unwrap();
        ledger.set_approval_for_all(u1(), u2(), false).unwrap();
        assert!(!ledger.is_approved_for_all(&u1(), &u2()).unwrap());
        assert!(matches!(
            ledger.safe_transfer_from(u2(), u1(), u2(), q(0), q(1), b""),
            Err(LedgerError::InsufficientAllowance { .. })
        ));
    }

    #[test]
    fn self_approval_is_rejected() {
        let ledger = funded();
        assert!(matches!(
            ledger.set_approval_for_all(u1(), u1(), true),
            Err(LedgerError::InvalidOperator { account }) if account == u1()
        ));
    }

    #[test]
    fn transfer_to_zero_address() {
        let ledger = funded();
        assert!(matches!(
            ledger.safe_transfer_from(u1(), u1(), Address::ZERO, q(0), q(1), b""),
            Err(LedgerError::TransferToZeroAddress)
        ));
        assert!(matches!(
            ledger.safe_batch_transfer_from(u1(), u1(), Address::ZERO, ids(&[0]), ids(&[1]), b""),
            Err(LedgerError::TransferToZeroAddress)
        ));
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(10));
    }

    #[test]
    fn batch_length_mismatch() {
        let ledger = funded();
        assert!(matches!(
            ledger.safe_batch_transfer_from(u1(), u1(), u2(), ids(&[0, 1]), ids(&[1]), b""),
            Err(LedgerError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn overdraw_leaves_balances_untouched() {
        let ledger = funded();
        let err = ledger
            .safe_transfer_from(u1(), u1(), u2(), q(0), q(11), b"")
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { required, available, .. }
                if required == q(11) && available == q(10)
        ));
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(10));
        assert_eq!(ledger.balance_of(&u2(), &q(0)).unwrap(), q(0));
    }

    #[test]
    fn late_failure_rolls_back_earlier_pairs() {
        let ledger = funded();
        let err = ledger
            .safe_batch_transfer_from(u1(), u1(), u2(), ids(&[0, 1, 2]), ids(&[10, 20, 31]), b"")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        let balances = ledger
            .balance_of_batch(&[u1(), u1(), u1(), u2(), u2()], &ids(&[0, 1, 2, 0, 1]))
            .unwrap();
        assert_eq!(balances, vec![q(10), q(20), q(30), q(0), q(0)]);
    }

    #[test]
    fn repeated_ids_are_debited_sequentially() {
        let ledger = funded();
        ledger
            .safe_batch_transfer_from(u1(), u1(), u2(), ids(&[0, 0]), ids(&[4, 6]), b"")
            .unwrap();
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(0));
        assert_eq!(ledger.balance_of(&u2(), &q(0)).unwrap(), q(10));

        let err = ledger
            .safe_batch_transfer_from(u2(), u2(), u1(), ids(&[0, 0]), ids(&[6, 6]), b"")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available, .. } if available == q(4)));
        assert_eq!(ledger.balance_of(&u2(), &q(0)).unwrap(), q(10));
    }

    #[test]
    fn self_transfer_keeps_balance() {
        let ledger = funded();
        ledger.safe_transfer_from(u1(), u1(), u1(), q(1), q(20), b"").unwrap();
        assert_eq!(ledger.balance_of(&u1(), &q(1)).unwrap(), q(20));
    }

    #[test]
    fn zero_amount_transfer_from_empty_account() {
        let ledger = new_ledger();
        ledger.safe_transfer_from(u1(), u1(), u2(), q(9), q(0), b"").unwrap();
        assert_eq!(ledger.balance_of(&u2(), &q(9)).unwrap(), q(0));
    }

    #[test]
    fn zero_amounts_emit_events_but_store_nothing() {
        let ledger = new_ledger();
        let minted = ledger.mint(owner(), u1(), q(3), q(0), b"").unwrap();
        let moved = ledger.safe_transfer_from(u1(), u1(), u2(), q(3), q(0), b"").unwrap();
        let batch = ledger
            .safe_batch_transfer_from(u1(), u1(), u2(), ids(&[3, 4]), ids(&[0, 0]), b"")
            .unwrap();
        assert_eq!(minted.events.len(), 1);
        assert_eq!(moved.events.len(), 1);
        assert_eq!(batch.events.len(), 1);
        assert!(!ledger.exists(&q(3)).unwrap());
        assert_eq!(ledger.into_store().balance_rows(), 0);
    }
}

// =============================================================================
// Receiver acknowledgment
// =============================================================================

mod receivers {
    use super::*;

    /// Records every callback and answers with a fixed signal
    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(Address, Address, Vec<TokenId>, Vec<Quantity>, Vec<u8>)>>,
        answer: Option<[u8; 4]>,
    }

    impl TokenReceiver for Recording {
        fn on_received(
            &self,
            operator: &Address,
            from: &Address,
            id: &TokenId,
            amount: &Quantity,
            data: &[u8],
        ) -> Result<[u8; 4], ReceiverError> {
            self.calls
                .lock()
                .push((*operator, *from, vec![*id], vec![*amount], data.to_vec()));
            Ok(self.answer.unwrap_or(RECEIVED_SELECTOR))
        }

        fn on_batch_received(
            &self,
            operator: &Address,
            from: &Address,
            ids: &[TokenId],
            amounts: &[Quantity],
            data: &[u8],
        ) -> Result<[u8; 4], ReceiverError> {
            self.calls
                .lock()
                .push((*operator, *from, ids.to_vec(), amounts.to_vec(), data.to_vec()));
            Ok(self.answer.unwrap_or(BATCH_RECEIVED_SELECTOR))
        }
    }

    fn contract() -> Address {
        addr(0xc0)
    }

    #[test]
    fn plain_accounts_are_never_asked() {
        let ledger = new_ledger();
        assert!(!ledger.account_kind(&u1()).is_programmable());
        ledger.mint(owner(), u1(), q(0), q(1), b"").unwrap();
    }

    #[test]
    fn accepting_receiver_gets_call_context() {
        let ledger = new_ledger();
        let recorder = Arc::new(Recording::default());
        ledger
            .register_account(contract(), AccountKind::programmable(recorder.clone()))
            .unwrap();

        ledger.mint(owner(), contract(), q(1), q(5), b"hello").unwrap();
        ledger.mint(owner(), u1(), q(2), q(5), b"").unwrap();
        ledger.set_approval_for_all(u1(), u2(), true).unwrap();
        ledger
            .safe_batch_transfer_from(u2(), u1(), contract(), ids(&[2]), ids(&[3]), b"")
            .unwrap();

        let calls = recorder.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (owner(), Address::ZERO, ids(&[1]), ids(&[5]), b"hello".to_vec()));
        assert_eq!(calls[1], (u2(), u1(), ids(&[2]), ids(&[3]), vec![]));
        drop(calls);

        assert_eq!(ledger.balance_of(&contract(), &q(1)).unwrap(), q(5));
        assert_eq!(ledger.balance_of(&contract(), &q(2)).unwrap(), q(3));
    }

    #[test]
    fn built_in_accepting_receiver() {
        let ledger = new_ledger();
        ledger
            .register_account(contract(), AccountKind::programmable(AcceptingReceiver))
            .unwrap();
        ledger
            .mint_batch(owner(), contract(), ids(&[0, 1]), ids(&[1, 1]), b"")
            .unwrap();
        assert_eq!(ledger.balance_of(&contract(), &q(1)).unwrap(), q(1));
    }

    #[test]
    fn rejection_rolls_back_mint() {
        let ledger = new_ledger();
        ledger
            .register_account(contract(), AccountKind::programmable(RejectingReceiver))
            .unwrap();

        let err = ledger.mint(owner(), contract(), q(0), q(10), b"").unwrap_err();
        assert!(matches!(err, LedgerError::ReceiverRejected { receiver, .. } if receiver == contract()));
        assert_eq!(ledger.balance_of(&contract(), &q(0)).unwrap(), q(0));
        assert_eq!(ledger.total_supply(&q(0)).unwrap(), q(0));
    }

    #[test]
    fn failure_rolls_back_transfer() {
        let ledger = new_ledger();
        ledger.mint(owner(), u1(), q(0), q(10), b"").unwrap();
        ledger
            .register_account(contract(), AccountKind::programmable(FailingReceiver))
            .unwrap();

        let err = ledger
            .safe_transfer_from(u1(), u1(), contract(), q(0), q(4), b"")
            .unwrap_err();
        match err {
            LedgerError::ReceiverRejected { reason, .. } => assert!(reason.contains("reverted")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(10));
        assert_eq!(ledger.balance_of(&contract(), &q(0)).unwrap(), q(0));
    }

    #[test]
    fn missing_capability_is_distinguished() {
        let ledger = new_ledger();
        ledger.mint(owner(), u1(), q(0), q(10), b"").unwrap();
        ledger.register_account(contract(), AccountKind::incapable()).unwrap();

        assert!(matches!(
            ledger.safe_transfer_from(u1(), u1(), contract(), q(0), q(1), b""),
            Err(LedgerError::ReceiverMissingCapability { receiver }) if receiver == contract()
        ));
        assert!(matches!(
            ledger.mint_batch(owner(), contract(), ids(&[0]), ids(&[1]), b""),
            Err(LedgerError::ReceiverMissingCapability { .. })
        ));
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(10));
    }

    #[test]
    fn refused_batch_transfer_rolls_back_every_pair() {
        let ledger = new_ledger();
        ledger
            .mint_batch(owner(), u1(), ids(&[0, 1]), ids(&[10, 10]), b"")
            .unwrap();
        ledger
            .register_account(contract(), AccountKind::programmable(RejectingReceiver))
            .unwrap();
        ledger.register_account(addr(0xc1), AccountKind::incapable()).unwrap();

        assert!(matches!(
            ledger.safe_batch_transfer_from(u1(), u1(), contract(), ids(&[0, 1, 0]), ids(&[1, 2, 3]), b""),
            Err(LedgerError::ReceiverRejected { receiver, .. }) if receiver == contract()
        ));
        assert!(matches!(
            ledger.safe_batch_transfer_from(u1(), u1(), addr(0xc1), ids(&[0, 1, 0]), ids(&[1, 2, 3]), b""),
            Err(LedgerError::ReceiverMissingCapability { receiver }) if receiver == addr(0xc1)
        ));

        let holders = [u1(), u1(), contract(), contract(), addr(0xc1), addr(0xc1)];
        let classes = ids(&[0, 1, 0, 1, 0, 1]);
        assert_eq!(
            ledger.balance_of_batch(&holders, &classes).unwrap(),
            ids(&[10, 10, 0, 0, 0, 0])
        );
        assert_eq!(ledger.total_supply(&q(0)).unwrap(), q(10));
    }

    #[test]
    fn wrong_signal_counts_as_rejection() {
        let ledger = new_ledger();
        let recorder = Arc::new(Recording {
            answer: Some([0xde, 0xad, 0xbe, 0xef]),
            ..Default::default()
        });
        ledger
            .register_account(contract(), AccountKind::programmable(recorder))
            .unwrap();

        match ledger.mint(owner(), contract(), q(0), q(1), b"").unwrap_err() {
            LedgerError::ReceiverRejected { reason, .. } => assert!(reason.contains("deadbeef")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn single_signal_does_not_cover_batches() {
        let ledger = new_ledger();
        let recorder = Arc::new(Recording {
            answer: Some(RECEIVED_SELECTOR),
            ..Default::default()
        });
        ledger
            .register_account(contract(), AccountKind::programmable(recorder))
            .unwrap();

        ledger.mint(owner(), contract(), q(0), q(1), b"").unwrap();
        assert!(matches!(
            ledger.mint_batch(owner(), contract(), ids(&[0]), ids(&[1]), b""),
            Err(LedgerError::ReceiverRejected { .. })
        ));
        assert_eq!(ledger.balance_of(&contract(), &q(0)).unwrap(), q(1));
    }

    #[test]
    fn account_kind_is_fixed_once() {
        let ledger = new_ledger();
        ledger.register_account(contract(), AccountKind::Plain).unwrap();
        assert!(matches!(
            ledger.register_account(contract(), AccountKind::incapable()),
            Err(LedgerError::AccountKindFixed { .. })
        ));
        assert!(matches!(
            ledger.register_account(Address::ZERO, AccountKind::Plain),
            Err(LedgerError::InvalidAccount)
        ));
    }
}

// =============================================================================
// Reentrancy and concurrency
// =============================================================================

mod reentrancy {
    use super::*;
    use std::thread;

    /// Receiver that calls back into the ledger from inside the handshake
    struct Reentrant {
        ledger: Weak<Ledger>,
        seen_balance: Mutex<Option<Quantity>>,
        in_progress: Mutex<Option<bool>>,
    }

    impl TokenReceiver for Reentrant {
        fn on_received(
            &self,
            _operator: &Address,
            _from: &Address,
            id: &TokenId,
            _amount: &Quantity,
            _data: &[u8],
        ) -> Result<[u8; 4], ReceiverError> {
            let ledger = self
                .ledger
                .upgrade()
                .ok_or_else(|| ReceiverError::Failed("ledger dropped".into()))?;
            *self.in_progress.lock() = Some(ledger.operation_in_progress());
            *self.seen_balance.lock() = Some(ledger.balance_of(&addr(0xc1), id)?);
            ledger.mint(owner(), addr(0xc1), *id, q(1), b"")?;
            Ok(RECEIVED_SELECTOR)
        }

        fn on_batch_received(
            &self,
            _operator: &Address,
            _from: &Address,
            _ids: &[TokenId],
            _amounts: &[Quantity],
            _data: &[u8],
        ) -> Result<[u8; 4], ReceiverError> {
            Ok(BATCH_RECEIVED_SELECTOR)
        }
    }

    #[test]
    fn nested_mutation_is_refused_and_rolled_back() {
        let ledger = Arc::new(new_ledger());
        ledger.mint(owner(), addr(0xc1), q(0), q(3), b"").unwrap();

        let receiver = Arc::new(Reentrant {
            ledger: Arc::downgrade(&ledger),
            seen_balance: Mutex::new(None),
            in_progress: Mutex::new(None),
        });
        ledger
            .register_account(addr(0xc1), AccountKind::programmable(receiver.clone()))
            .unwrap();

        let err = ledger.mint(owner(), addr(0xc1), q(0), q(10), b"").unwrap_err();
        match err {
            LedgerError::ReceiverRejected { reason, .. } => assert!(reason.contains("reentrant")),
            other => panic!("unexpected error: {other:?}"),
        }

        // The nested read saw the pending credit.
        assert_eq!(*receiver.seen_balance.lock(), Some(q(13)));
        assert_eq!(*receiver.in_progress.lock(), Some(true));
        assert_eq!(ledger.balance_of(&addr(0xc1), &q(0)).unwrap(), q(3));
        assert!(!ledger.operation_in_progress());
    }

    /// Receiver that reads the ledger during the handshake, from its own
    /// thread and from a helper thread
    struct Snooping {
        ledger: Weak<Ledger>,
        accept: bool,
        seen: Mutex<Option<(Quantity, Quantity, Quantity, Quantity)>>,
    }

    impl TokenReceiver for Snooping {
        fn on_received(
            &self,
            _operator: &Address,
            from: &Address,
            id: &TokenId,
            _amount: &Quantity,
            _data: &[u8],
        ) -> Result<[u8; 4], ReceiverError> {
            let ledger = self
                .ledger
                .upgrade()
                .ok_or_else(|| ReceiverError::Failed("ledger dropped".into()))?;
            let sender = ledger.balance_of(from, id)?;
            let own = ledger.balance_of(&addr(0xc1), id)?;
            let supply = ledger.total_supply(id)?;
            let outside = {
                let ledger = Arc::clone(&ledger);
                let id = *id;
                thread::spawn(move || ledger.balance_of(&addr(0xc1), &id))
                    .join()
                    .map_err(|_| ReceiverError::Failed("reader panicked".into()))??
            };
            *self.seen.lock() = Some((sender, own, supply, outside));
            Ok(if self.accept { RECEIVED_SELECTOR } else { [0; 4] })
        }

        fn on_batch_received(
            &self,
            _operator: &Address,
            _from: &Address,
            _ids: &[TokenId],
            _amounts: &[Quantity],
            _data: &[u8],
        ) -> Result<[u8; 4], ReceiverError> {
            Ok(BATCH_RECEIVED_SELECTOR)
        }
    }

    fn snooped_transfer(accept: bool) -> (Arc<Ledger>, Arc<Snooping>, bool) {
        let ledger = Arc::new(new_ledger());
        ledger.mint(owner(), u1(), q(0), q(10), b"").unwrap();
        let receiver = Arc::new(Snooping {
            ledger: Arc::downgrade(&ledger),
            accept,
            seen: Mutex::new(None),
        });
        ledger
            .register_account(addr(0xc1), AccountKind::programmable(receiver.clone()))
            .unwrap();
        let ok = ledger
            .safe_transfer_from(u1(), u1(), addr(0xc1), q(0), q(4), b"")
            .is_ok();
        (ledger, receiver, ok)
    }

    #[test]
    fn receiver_reads_see_the_transfer_in_progress() {
        let (ledger, receiver, ok) = snooped_transfer(true);
        assert!(ok);
        // Sender debited and recipient credited; other threads still see the
        // committed zero.
        assert_eq!(*receiver.seen.lock(), Some((q(6), q(4), q(10), q(0))));
        assert_eq!(ledger.balance_of(&addr(0xc1), &q(0)).unwrap(), q(4));
    }

    #[test]
    fn rejected_transfer_restores_committed_view() {
        let (ledger, receiver, ok) = snooped_transfer(false);
        assert!(!ok);
        assert_eq!(*receiver.seen.lock(), Some((q(6), q(4), q(10), q(0))));
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(10));
        assert_eq!(ledger.balance_of(&addr(0xc1), &q(0)).unwrap(), q(0));
        assert_eq!(ledger.total_supply(&q(0)).unwrap(), q(10));
    }

    #[test]
    fn ledger_is_usable_after_refused_reentry() {
        let ledger = Arc::new(new_ledger());
        let receiver = Arc::new(Reentrant {
            ledger: Arc::downgrade(&ledger),
            seen_balance: Mutex::new(None),
            in_progress: Mutex::new(None),
        });
        ledger
            .register_account(addr(0xc1), AccountKind::programmable(receiver))
            .unwrap();

        assert!(ledger.mint(owner(), addr(0xc1), q(0), q(1), b"").is_err());
        ledger.mint(owner(), u1(), q(0), q(1), b"").unwrap();
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(1));
    }

    #[test]
    fn concurrent_transfers_conserve_supply() {
        let ledger = Arc::new(new_ledger());
        ledger.mint(owner(), u1(), q(0), q(1000), b"").unwrap();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for _ in 0..25 {
                        ledger
                            .safe_transfer_from(u1(), u1(), addr(0x10 + i), q(0), q(1), b"")
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(800));
        for i in 0..8u8 {
            assert_eq!(ledger.balance_of(&addr(0x10 + i), &q(0)).unwrap(), q(25));
        }
        assert_eq!(ledger.total_supply(&q(0)).unwrap(), q(1000));
    }
}

// =============================================================================
// Persistent store
// =============================================================================

mod persistence {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn balances_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let config = LedgerConfig::new(owner(), URI);

        {
            let db = LedgerDb::open(dir.path()).unwrap();
            let ledger = Ledger::with_store(config.clone(), db);
            ledger
                .mint_batch(owner(), u1(), ids(&[0, 1]), ids(&[5, 6]), b"")
                .unwrap();
            ledger.set_approval_for_all(u1(), u2(), true).unwrap();
            ledger.safe_transfer_from(u2(), u1(), u2(), q(1), q(2), b"").unwrap();
            assert!(ledger.mint(u1(), u1(), q(0), q(1), b"").is_err());
            ledger.into_store().database().close();
        }

        let db = LedgerDb::open(dir.path()).unwrap();
        let ledger = Ledger::with_store(config, db);
        assert_eq!(
            ledger.balance_of_batch(&[u1(), u1(), u2()], &ids(&[0, 1, 1])).unwrap(),
            vec![q(5), q(4), q(2)]
        );
        assert_eq!(ledger.total_supply(&q(1)).unwrap(), q(6));
        assert!(ledger.is_approved_for_all(&u1(), &u2()).unwrap());
    }

    #[test]
    fn rejected_transfer_writes_nothing_to_disk() {
        let dir = TempDir::new().unwrap();
        let db = LedgerDb::open(dir.path()).unwrap();
        let ledger = Ledger::with_store(LedgerConfig::new(owner(), URI), db);
        ledger.mint(owner(), u1(), q(0), q(1), b"").unwrap();
        ledger
            .register_account(addr(0xc0), AccountKind::programmable(RejectingReceiver))
            .unwrap();

        assert!(ledger.safe_transfer_from(u1(), u1(), addr(0xc0), q(0), q(1), b"").is_err());
        assert_eq!(ledger.balance_of(&u1(), &q(0)).unwrap(), q(1));
        assert_eq!(ledger.balance_of(&addr(0xc0), &q(0)).unwrap(), q(0));
    }
}

// =============================================================================
// Properties
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Mint { to: u8, id: u8, amount: u64 },
        Transfer { from: u8, to: u8, id: u8, amount: u64 },
        Batch { from: u8, to: u8, pairs: Vec<(u8, u64)> },
    }

    const HOLDERS: u8 = 4;
    const CLASSES: u8 = 3;

    fn holder(i: u8) -> Address {
        addr(i + 1)
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..HOLDERS, 0..CLASSES, 0..100u64).prop_map(|(to, id, amount)| Op::Mint { to, id, amount }),
            (0..HOLDERS, 0..HOLDERS, 0..CLASSES, 0..60u64)
                .prop_map(|(from, to, id, amount)| Op::Transfer { from, to, id, amount }),
            (0..HOLDERS, 0..HOLDERS, prop::collection::vec((0..CLASSES, 0..40u64), 0..4))
                .prop_map(|(from, to, pairs)| Op::Batch { from, to, pairs }),
        ]
    }

    fn apply(ledger: &Ledger, op: &Op) {
        let _ = match op {
            Op::Mint { to, id, amount } => {
                ledger.mint(owner(), holder(*to), q(*id as u64), q(*amount), b"")
            }
            Op::Transfer { from, to, id, amount } => ledger.safe_transfer_from(
                holder(*from),
                holder(*from),
                holder(*to),
                q(*id as u64),
                q(*amount),
                b"",
            ),
            Op::Batch { from, to, pairs } => ledger.safe_batch_transfer_from(
                holder(*from),
                holder(*from),
                holder(*to),
                pairs.iter().map(|(id, _)| q(*id as u64)).collect(),
                pairs.iter().map(|(_, amount)| q(*amount)).collect(),
                b"",
            ),
        };
    }

    fn snapshot(ledger: &Ledger) -> Vec<Quantity> {
        let mut out = Vec::new();
        for h in 0..HOLDERS {
            for id in 0..CLASSES {
                out.push(ledger.balance_of(&holder(h), &q(id as u64)).unwrap());
            }
        }
        out
    }

    proptest! {
        /// Property: per class, holdings always add up to the minted supply
        #[test]
        fn prop_supply_is_conserved(ops in prop::collection::vec(arb_op(), 1..40)) {
            let ledger = new_ledger();
            for op in &ops {
                apply(&ledger, op);
            }
            for id in 0..CLASSES {
                let id = q(id as u64);
                let held = (0..HOLDERS).fold(U256::zero(), |acc, h| {
                    acc + ledger.balance_of(&holder(h), &id).unwrap()
                });
                prop_assert_eq!(held, ledger.total_supply(&id).unwrap());
            }
        }

        /// Property: a failed operation leaves every balance unchanged
        #[test]
        fn prop_failures_are_invisible(
            ops in prop::collection::vec(arb_op(), 0..20),
            attempt in arb_op()
        ) {
            let ledger = new_ledger();
            for op in &ops {
                apply(&ledger, op);
            }
            let before = snapshot(&ledger);
            let result = match &attempt {
                Op::Mint { to, id, amount } => {
                    ledger.mint(owner(), holder(*to), q(*id as u64), q(*amount), b"").map(|_| ())
                }
                Op::Transfer { from, to, id, amount } => ledger
                    .safe_transfer_from(holder(*from), holder(*from), holder(*to), q(*id as u64), q(*amount), b"")
                    .map(|_| ()),
                Op::Batch { from, to, pairs } => ledger
                    .safe_batch_transfer_from(
                        holder(*from),
                        holder(*from),
                        holder(*to),
                        pairs.iter().map(|(id, _)| q(*id as u64)).collect(),
                        pairs.iter().map(|(_, amount)| q(*amount)).collect(),
                        b"",
                    )
                    .map(|_| ()),
            };
            if result.is_err() {
                prop_assert_eq!(before, snapshot(&ledger));
            }
        }
    }
}
