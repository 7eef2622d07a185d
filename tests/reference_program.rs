//! End-to-end checks through the public API: the reference program, the
//! root properties external callers rely on, and the bundle artifacts.

use filament::{
    ctx8, evaluate, merkle, Bits, ExecutionResult, MechanicalError, Node, NodeRef, ProgramBlob,
    ProgramBundle, PrimOp, RootCache, Ty,
};

fn zero_scribe(width: u64) -> NodeRef {
    Node::scribe(Ty::unit(), Ty::word(width), Bits::zeros(width as usize)).unwrap()
}

#[test]
fn reference_program_succeeds_with_no_input() {
    let program = ctx8::reference_program().unwrap();
    let result = evaluate(&program, &Bits::new());
    assert_eq!(result, ExecutionResult::Succeeded(Bits::new()));
}

#[test]
fn reference_roots_are_published_and_stable() {
    let published = ctx8::reference_roots();
    let recomputed = merkle::roots(&ctx8::reference_program().unwrap());
    assert_eq!(published, recomputed);

    // All three roots are distinct and exposed as 8 big-endian words.
    assert_ne!(published.cmr.to_hex(), published.imr.to_hex());
    assert_ne!(published.imr.to_hex(), published.amr.to_hex());
    assert_eq!(published.cmr.to_words().len(), 8);
}

#[test]
fn scribe_equality_scenario_flips_with_one_bit() {
    // Two identical 256-bit constants compared and asserted: succeeds.
    let program = ctx8::eq256_verify(&zero_scribe(256), &zero_scribe(256)).unwrap();
    assert_eq!(
        evaluate(&program, &Bits::new()),
        ExecutionResult::Succeeded(Bits::new())
    );

    // Mutate one bit of one literal: the program now correctly rejects.
    let mut mutated = Bits::zeros(256);
    mutated.flip(17);
    let tampered = Node::scribe(Ty::unit(), Ty::word(256), mutated).unwrap();
    let program = ctx8::eq256_verify(&zero_scribe(256), &tampered).unwrap();
    match evaluate(&program, &Bits::new()) {
        ExecutionResult::Failed(failure) => assert_eq!(failure.prim, "verify"),
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn witness_substitution_preserves_commitment_only() {
    let build = |payload: Bits| {
        let witness = Node::witness(Ty::unit(), Ty::word(256), payload).unwrap();
        ctx8::eq256_verify(&witness, &zero_scribe(256)).unwrap()
    };
    let honest = build(Bits::zeros(256));
    let mut bits = Bits::zeros(256);
    bits.flip(0);
    let tampered = build(bits);

    let a = merkle::roots(&honest);
    let b = merkle::roots(&tampered);
    assert_eq!(a.cmr, b.cmr);
    assert_ne!(a.imr, b.imr);
    assert_ne!(a.amr, b.amr);

    // And the two programs behave differently, as intended.
    assert!(evaluate(&honest, &Bits::new()).is_success());
    assert!(matches!(
        evaluate(&tampered, &Bits::new()),
        ExecutionResult::Failed(_)
    ));
}

#[test]
fn roots_agree_across_construction_orders_and_apis() {
    // The same logical DAG built twice, children in different order.
    let build_forward = || {
        let left = zero_scribe(256);
        let right = zero_scribe(256);
        ctx8::eq256_verify(&left, &right).unwrap()
    };
    let build_backward = || {
        let right = zero_scribe(256);
        let left = zero_scribe(256);
        ctx8::eq256_verify(&left, &right).unwrap()
    };
    let forward = merkle::roots(&build_forward());
    let backward = merkle::roots(&build_backward());
    assert_eq!(forward, backward);

    // Cache reuse and the parallel batch API agree with single calls.
    let mut cache = RootCache::new();
    let programs = [build_forward(), build_backward()];
    let cached = [cache.roots(&programs[0]), cache.roots(&programs[1])];
    let batched = merkle::roots_many(&programs);
    assert_eq!(cached.as_slice(), batched.as_slice());
}

#[test]
fn pruned_branch_always_faults() {
    let digest = merkle::cmr(&zero_scribe(8)).as_midstate();
    let hidden = Node::hidden(Ty::unit(), Ty::word(8), digest);
    assert_eq!(
        evaluate(&hidden, &Bits::new()),
        ExecutionResult::Faulted(MechanicalError::PrunedBranchReached)
    );

    // Hashing it is fine; only execution is forbidden.
    let triple = merkle::roots(&hidden);
    assert_eq!(triple, merkle::roots(&hidden));
}

#[test]
fn evaluation_is_deterministic() {
    let program = ctx8::reference_program().unwrap();
    let first = evaluate(&program, &Bits::new());
    let second = evaluate(&program, &Bits::new());
    assert_eq!(first, second);
}

#[test]
fn compression_primitive_is_shared() {
    // The digest the machine computes through the ctx8 combinators must
    // equal the one the sha256 module computes directly: one compress
    // function, two call sites.
    let absorbed = Node::comp(
        &Node::pair(
            &Node::prim(PrimOp::Ctx8Init),
            &ctx8::scribe_bytes(Ty::unit(), &ctx8::REF_BLOCK).unwrap(),
        )
        .unwrap(),
        &ctx8::ctx8_addn(16).unwrap(),
    )
    .unwrap();
    let digest = Node::comp(&absorbed, &Node::prim(PrimOp::Ctx8Finalize)).unwrap();
    match evaluate(&digest, &Bits::new()) {
        ExecutionResult::Succeeded(bits) => {
            assert_eq!(
                bits.to_bytes(),
                filament::sha256::sha256(&ctx8::REF_BLOCK).0.to_vec()
            );
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn bundle_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ctx8-reference.json");

    let blob = ProgramBlob::new(vec![0x01, 0x02, 0x03]);
    let bundle = ProgramBundle::new("ctx8-reference", &ctx8::reference_roots()).with_blob(&blob);
    bundle.write(&path).unwrap();

    let loaded = ProgramBundle::load(&path).unwrap();
    assert_eq!(loaded, bundle);
    assert_eq!(loaded.cmr, ctx8::reference_roots().cmr.to_hex());
    assert_eq!(loaded.decode_blob().unwrap().unwrap(), blob);
}
