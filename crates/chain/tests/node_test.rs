use petchain_chain::{
    Ledger, LedgerConfig, LedgerError, NodeState, PeerClient, PeerError, PrefetchedChains,
    Resolution, SearchQuery,
};
use petchain_consensus::MINING_REWARD;
use petchain_core::{Block, FoundReport, Keypair, LostReport, PetId, PetProfile, PetStatus, Transaction};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DIFFICULTY: u32 = 1;

fn node(id: &str) -> NodeState {
    NodeState::new(id, Ledger::new(LedgerConfig::with_difficulty(DIFFICULTY)).unwrap())
}

/// Register then mine `count` pets, one block each.
fn grow(node: &NodeState, owner: &Keypair, prefix: &str, count: usize) {
    for i in 0..count {
        let id = PetId::new(format!("{}-{}", prefix, i));
        node.register_pet(Some(id), PetProfile::new(format!("Pet {}", i), "Ann", "555"), owner)
            .unwrap();
        node.mine().unwrap();
    }
}

fn peers(node: &NodeState, chains: &[(&str, Vec<Block>)]) -> PrefetchedChains {
    let mut prefetched = PrefetchedChains::new();
    for (address, chain) in chains {
        node.register_node(address).unwrap();
        prefetched.insert(*address, chain.clone());
    }
    prefetched
}

#[test]
fn test_lost_and_found_lifecycle() {
    let node = node("node-a");
    let owner = Keypair::generate();
    let stranger = Keypair::generate();
    let finder = Keypair::generate();

    let (pet_id, _) = node
        .register_pet(None, PetProfile::new("Max", "Ann", "555-0100").with_microchip("985112004"), &owner)
        .unwrap();
    node.mine().unwrap();
    assert_eq!(node.get_pet(&pet_id).unwrap().status, PetStatus::Active);

    node.report_lost(
        pet_id.clone(),
        &owner,
        LostReport {
            location: Some("Central Park".into()),
            description: None,
        },
    )
    .unwrap();
    node.mine().unwrap();
    let record = node.get_pet(&pet_id).unwrap();
    assert_eq!(record.status, PetStatus::Lost);
    assert_eq!(
        record.lost.as_ref().unwrap().report.location.as_deref(),
        Some("Central Park")
    );

    // A stranger cannot touch the record.
    let chain_before = node.get_chain().unwrap();
    assert!(matches!(
        node.report_lost(pet_id.clone(), &stranger, LostReport::default()),
        Err(LedgerError::Unauthorized(_))
    ));
    assert!(matches!(
        node.transfer(pet_id.clone(), &stranger, finder.fingerprint()),
        Err(LedgerError::Unauthorized(_))
    ));
    assert!(matches!(
        node.report_found(
            pet_id.clone(),
            stranger.fingerprint(),
            &finder,
            FoundReport {
                finder_contact: "x".into()
            }
        ),
        Err(LedgerError::Unauthorized(_))
    ));
    assert!(node.pending_transactions().unwrap().is_empty());
    assert_eq!(node.get_chain().unwrap(), chain_before);
    assert_eq!(node.get_pet(&pet_id).unwrap(), record);

    // Finders use the owner fingerprint shown on the public record.
    node.report_found(
        pet_id.clone(),
        record.owner,
        &finder,
        FoundReport {
            finder_contact: "555-0199".into(),
        },
    )
    .unwrap();
    node.mine().unwrap();
    let record = node.get_pet(&pet_id).unwrap();
    assert_eq!(record.status, PetStatus::Found);
    assert_eq!(record.found.unwrap().finder, Some(finder.fingerprint()));

    let history = node.get_history(&pet_id, false).unwrap();
    let blocks: Vec<_> = history.iter().map(|e| e.block_index).collect();
    assert_eq!(blocks, vec![Some(1), Some(2), Some(3)]);
}

#[test]
fn test_search_orders_by_pet_id() {
    let node = node("node-a");
    let owner = Keypair::generate();
    for (id, name) in [("c", "Maximus"), ("a", "Max"), ("b", "Bella")] {
        node.register_pet(Some(id.into()), PetProfile::new(name, "Ann", "555"), &owner)
            .unwrap();
    }
    node.mine().unwrap();

    let names: Vec<_> = node
        .search_pets(&SearchQuery::new("max"))
        .unwrap()
        .into_iter()
        .map(|r| r.profile.name)
        .collect();
    assert_eq!(names, vec!["Max", "Maximus"]);
}

#[test]
fn test_longer_valid_chain_replaces_local() {
    let local = node("node-a");
    let remote = node("node-b");
    let owner = Keypair::generate();
    grow(&local, &owner, "local", 2);
    grow(&remote, &owner, "remote", 4);
    assert_eq!(local.get_chain().unwrap().len(), 3);
    assert_eq!(remote.get_chain().unwrap().len(), 5);

    // Pending on the local node; still unconfirmed after the switch.
    local
        .report_lost("local-0".into(), &owner, LostReport::default())
        .unwrap();

    let client = peers(&local, &[("node-b:5002", remote.get_chain().unwrap())]);
    let resolution = local.resolve_conflicts(&client).unwrap();

    assert_eq!(
        resolution,
        Resolution::Replaced {
            peer: "node-b:5002".into(),
            length: 5
        }
    );
    assert_eq!(local.get_chain().unwrap(), remote.get_chain().unwrap());
    assert_eq!(
        local.search_pets(&SearchQuery::new("")).unwrap(),
        remote.search_pets(&SearchQuery::new("")).unwrap()
    );
    assert!(matches!(
        local.get_pet(&"local-0".into()),
        Err(LedgerError::NotFound(_))
    ));
    assert_eq!(local.pending_transactions().unwrap().len(), 1);
}

#[test]
fn test_equal_length_keeps_local() {
    let local = node("node-a");
    let remote = node("node-b");
    let owner = Keypair::generate();
    grow(&local, &owner, "local", 2);
    grow(&remote, &owner, "remote", 2);

    let before = local.get_chain().unwrap();
    let client = peers(&local, &[("node-b:5002", remote.get_chain().unwrap())]);

    assert_eq!(
        local.resolve_conflicts(&client).unwrap(),
        Resolution::Kept { length: 3 }
    );
    assert_eq!(local.get_chain().unwrap(), before);
}

#[test]
fn test_invalid_longer_chain_keeps_local() {
    let local = node("node-a");
    let remote = node("node-b");
    let owner = Keypair::generate();
    grow(&local, &owner, "local", 2);
    grow(&remote, &owner, "remote", 4);

    let mut tampered = remote.get_chain().unwrap();
    if let petchain_core::Payload::Register(profile) = &mut tampered[2].transactions[0].payload {
        profile.name = "Forged".into();
    }

    let before = local.get_chain().unwrap();
    let client = peers(&local, &[("node-b:5002", tampered)]);

    assert_eq!(
        local.resolve_conflicts(&client).unwrap(),
        Resolution::Kept { length: 3 }
    );
    assert_eq!(local.get_chain().unwrap(), before);
}

struct PartiallyReachable {
    chain: Vec<Block>,
}

impl PeerClient for PartiallyReachable {
    fn fetch_chain(&self, address: &str) -> Result<Vec<Block>, PeerError> {
        if address.starts_with("down") {
            return Err(PeerError::Unreachable {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(self.chain.clone())
    }
}

#[test]
fn test_unreachable_peers_skipped() {
    let local = node("node-a");
    let remote = node("node-b");
    let owner = Keypair::generate();
    grow(&remote, &owner, "remote", 1);

    local.register_node("down.example:5002").unwrap();
    local.register_node("up.example:5003").unwrap();
    let client = PartiallyReachable {
        chain: remote.get_chain().unwrap(),
    };

    assert!(matches!(
        local.resolve_conflicts(&client).unwrap(),
        Resolution::Replaced { ref peer, length: 2 } if peer == "up.example:5003"
    ));
}

#[test]
fn test_json_roundtrip_preserves_validity() {
    let node = node("node-a");
    let owner = Keypair::generate();
    grow(&node, &owner, "pet", 2);

    let ledger = Ledger::new(LedgerConfig::with_difficulty(DIFFICULTY)).unwrap();
    let chain = node.get_chain().unwrap();
    let json = serde_json::to_string(&chain).unwrap();
    let back: Vec<Block> = serde_json::from_str(&json).unwrap();

    assert_eq!(back, chain);
    assert!(ledger.is_valid_chain(&back));
}

#[test]
fn test_cancel_discards_in_flight_mining() {
    // Unreachable difficulty: mining only ends through cancellation.
    let node = Arc::new(NodeState::new(
        "node-a",
        Ledger::new(LedgerConfig::with_difficulty(64)).unwrap(),
    ));
    let owner = Keypair::generate();
    node.register_pet(Some("P1".into()), PetProfile::new("Max", "Ann", "555"), &owner)
        .unwrap();

    let miner = {
        let node = Arc::clone(&node);
        thread::spawn(move || node.mine())
    };
    thread::sleep(Duration::from_millis(50));

    // Reads are served while the search runs.
    assert_eq!(node.get_chain().unwrap().len(), 1);
    node.cancel_mining();

    let result = miner.join().unwrap();
    assert!(matches!(result, Err(LedgerError::MiningCancelled)));
    assert_eq!(node.get_chain().unwrap(), vec![Block::genesis()]);
    assert_eq!(node.pending_transactions().unwrap().len(), 1);
}

#[test]
fn test_stale_block_discarded_after_replacement() {
    let owner = Keypair::generate();
    let mut ledger = Ledger::new(LedgerConfig::with_difficulty(DIFFICULTY)).unwrap();
    ledger
        .submit(
            Transaction::register("P1".into(), owner.fingerprint(), PetProfile::new("Max", "Ann", "555"))
                .unwrap()
                .signed(&owner),
        )
        .unwrap();
    let candidate = ledger.prepare_candidate("node-a").unwrap();

    let remote = node("node-b");
    grow(&remote, &owner, "remote", 2);
    assert!(ledger.replace_chain(remote.get_chain().unwrap()).unwrap());

    let sealed = ledger.proof_of_work().seal(candidate).unwrap();
    assert!(matches!(ledger.append_mined(sealed), Err(LedgerError::StaleTip)));
    assert_eq!(ledger.chain(), remote.get_chain().unwrap().as_slice());
    assert!(ledger.is_valid_chain(ledger.chain()));
}

#[test]
fn test_chain_replaying_a_confirmed_transaction_rejected() {
    let local = node("node-a");
    let remote = node("node-b");
    let owner = Keypair::generate();
    grow(&local, &owner, "local", 1);
    grow(&remote, &owner, "remote", 2);

    // Extend the remote chain with a block that re-includes its first registration.
    let mut replayed = remote.get_chain().unwrap();
    let tip = replayed.last().unwrap().clone();
    let candidate = Block::candidate(
        tip.index + 1,
        tip.hash,
        vec![
            replayed[1].transactions[0].clone(),
            Transaction::reward("node-b", MINING_REWARD).unwrap(),
        ],
    );
    let ledger = Ledger::new(LedgerConfig::with_difficulty(DIFFICULTY)).unwrap();
    replayed.push(ledger.proof_of_work().seal(candidate).unwrap());
    assert!(!ledger.is_valid_chain(&replayed));

    let before = local.get_chain().unwrap();
    let client = peers(&local, &[("node-b:5002", replayed.clone())]);
    assert_eq!(
        local.resolve_conflicts(&client).unwrap(),
        Resolution::Kept { length: 2 }
    );
    assert!(matches!(
        local.import_chain(replayed),
        Err(LedgerError::InvalidBlock(_))
    ));
    assert_eq!(local.get_chain().unwrap(), before);
}
