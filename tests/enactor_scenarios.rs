use halo_bfs::{
    BfsProblem, ConfigError, CsrGraph, Device, DeviceProps, EnactError, Enactor, EnactorConfig,
    GhostToken, ProblemConfig, SmVersion, Status, INVALID_PREDECESSOR, UNVISITED,
};

fn test_device(arch: SmVersion, units: usize) -> Device {
    Device::new(DeviceProps {
        arch,
        units,
        warp_lanes: 4,
        max_groups_per_unit: 8,
        max_bound_elements: DeviceProps::DEFAULT_BOUND_ELEMENTS,
    })
    .unwrap()
}

fn enactor(config: EnactorConfig) -> Enactor {
    Enactor::with_config(config).with_device(test_device(SmVersion::SM20, 4))
}

/// 0-1, 0-2, 1-3, 2-3, 3-4
fn diamond_tail() -> CsrGraph {
    CsrGraph::from_undirected_edges(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)])
}

#[derive(Clone, Copy, Debug)]
enum Variant {
    Iterative,
    Fused,
}

fn run<'brand>(
    enactor: &mut Enactor,
    token: &mut GhostToken<'brand>,
    problem: &BfsProblem<'_, 'brand>,
    source: u32,
    variant: Variant,
) -> Result<(), EnactError> {
    match variant {
        Variant::Iterative => enactor.enact_iterative_search(token, problem, source, 0),
        Variant::Fused => enactor.enact_fused_search(token, problem, source, 0),
    }
}

#[test]
fn diamond_tail_labels_and_depth() {
    let graph = diamond_tail();
    for variant in [Variant::Iterative, Variant::Fused] {
        for config in [
            EnactorConfig::default(),
            EnactorConfig::default().with_throttle(false),
            EnactorConfig::default().with_debug(true),
            EnactorConfig::default().with_instrument(true),
        ] {
            GhostToken::new(|mut token| {
                let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
                let mut enactor = enactor(config);
                run(&mut enactor, &mut token, &problem, 0, variant).unwrap();

                assert_eq!(problem.labels(&token), vec![0, 1, 1, 2, 3], "{variant:?} {config:?}");
                let stats = enactor.statistics();
                assert_eq!(stats.search_depth, 3);
                assert_eq!(stats.total_queued, 5);
                assert!((0.0..=1.0).contains(&stats.avg_duty));
                assert_eq!(problem.visited_count(&token), 5);
                assert_eq!(enactor.last_status(), Status::Success);
            });
        }
    }
}

#[test]
fn instrumented_level_history() {
    let graph = diamond_tail();
    for variant in [Variant::Iterative, Variant::Fused] {
        GhostToken::new(|mut token| {
            let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
            let mut enactor = enactor(EnactorConfig::default().with_instrument(true));
            run(&mut enactor, &mut token, &problem, 0, variant).unwrap();

            let history: Vec<_> = enactor
                .level_history()
                .iter()
                .map(|l| (l.level, l.queue_index, l.vertices, l.edges))
                .collect();
            // Level 1 expands 1 and 2, both reaching 3; contract keeps one copy.
            assert_eq!(
                history,
                vec![(0, 0, 1, 2), (1, 2, 2, 2), (2, 4, 1, 1), (3, 6, 1, 0)],
                "{variant:?}"
            );
            assert_eq!(enactor.iteration(), 4);
            assert_eq!(enactor.queue_index(), 9);
        });
    }
}

#[test]
fn variants_agree_on_a_mixed_degree_graph() {
    // Hub of degree 600 (group gather), a vertex of degree 41 (warp gather),
    // and a tail of short lists (scan gather).
    let mut edges: Vec<(u32, u32)> = (1..=600).map(|v| (0, v)).collect();
    edges.extend((601..=640).map(|v| (1, v)));
    edges.extend((641..700).map(|v| (v - 1, v)));
    let graph = CsrGraph::from_undirected_edges(700, &edges);

    for arch in [SmVersion::SM20, SmVersion::SM13] {
        let labels: Vec<Vec<u32>> = [Variant::Iterative, Variant::Fused]
            .into_iter()
            .map(|variant| {
                GhostToken::new(|mut token| {
                    let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
                    let mut enactor =
                        Enactor::with_config(EnactorConfig::default()).with_device(test_device(arch, 3));
                    run(&mut enactor, &mut token, &problem, 0, variant).unwrap();
                    assert_eq!(enactor.statistics().search_depth, 61);
                    problem.labels(&token)
                })
            })
            .collect();
        assert_eq!(labels[0], labels[1], "{arch}");
        assert_eq!(labels[0][600], 1);
        assert_eq!(labels[0][640], 2);
        assert_eq!(labels[0][699], 61);
    }
}

#[test]
fn repeated_searches_are_idempotent() {
    let graph = diamond_tail();
    GhostToken::new(|mut token| {
        let problem = BfsProblem::new(&graph, ProblemConfig::default().with_predecessors()).unwrap();
        let mut enactor = enactor(EnactorConfig::default());

        enactor.enact_iterative_search(&mut token, &problem, 0, 0).unwrap();
        let first = (problem.labels(&token), enactor.statistics().search_depth);

        enactor.enact_fused_search(&mut token, &problem, 4, 0).unwrap();
        assert_eq!(problem.labels(&token), vec![3, 2, 2, 1, 0]);

        enactor.enact_iterative_search(&mut token, &problem, 0, 0).unwrap();
        assert_eq!((problem.labels(&token), enactor.statistics().search_depth), first);
        assert_eq!(enactor.statistics().total_queued, 5);
    });
}

#[test]
fn predecessors_form_a_bfs_tree() {
    let graph = diamond_tail();
    for variant in [Variant::Iterative, Variant::Fused] {
        GhostToken::new(|mut token| {
            let problem =
                BfsProblem::new(&graph, ProblemConfig::default().with_predecessors()).unwrap();
            let mut enactor = enactor(EnactorConfig::default());
            run(&mut enactor, &mut token, &problem, 0, variant).unwrap();

            let labels = problem.labels(&token);
            let preds = problem.predecessors(&token).unwrap();
            assert_eq!(preds[0], INVALID_PREDECESSOR);
            for v in 1..graph.node_count() {
                let p = preds[v];
                assert_eq!(labels[p as usize] + 1, labels[v], "vertex {v}");
                assert!(graph.neighbors(p).contains(&(v as u32)));
            }
            assert!(preds[3] == 1 || preds[3] == 2);
        });
    }
}

#[test]
fn isolated_source_and_unreachable_vertices() {
    let graph = CsrGraph::from_undirected_edges(4, &[(1, 2)]);
    for variant in [Variant::Iterative, Variant::Fused] {
        GhostToken::new(|mut token| {
            let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
            let mut enactor = enactor(EnactorConfig::default().with_instrument(true));
            run(&mut enactor, &mut token, &problem, 0, variant).unwrap();
            assert_eq!(problem.labels(&token), vec![0, UNVISITED, UNVISITED, UNVISITED]);
            assert_eq!(enactor.statistics().search_depth, 0);
            assert_eq!(enactor.statistics().total_queued, 0);
            assert_eq!(enactor.level_history().len(), 1);
        });
    }
}

#[test]
fn frontier_overflow_is_a_configuration_error() {
    let graph = diamond_tail();
    for variant in [Variant::Iterative, Variant::Fused] {
        GhostToken::new(|mut token| {
            let problem =
                BfsProblem::new(&graph, ProblemConfig::default().with_queue_sizing(0.1)).unwrap();
            assert_eq!(problem.queues().capacity(0), 1);
            let mut enactor = enactor(EnactorConfig::default());
            let err = run(&mut enactor, &mut token, &problem, 0, variant).unwrap_err();
            assert_eq!(
                err,
                EnactError::InvalidConfiguration(ConfigError::QueueOverflow {
                    queue: "edge",
                    capacity: 1,
                    requested: 2,
                }),
                "{variant:?}"
            );
            assert_eq!(enactor.last_status(), Status::InvalidConfiguration);
        });
    }
}

#[test]
fn fused_rejects_oversubscription_before_dispatch() {
    let graph = diamond_tail();
    GhostToken::new(|mut token| {
        let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
        let mut enactor = enactor(EnactorConfig::default());
        let err = enactor.enact_fused_search(&mut token, &problem, 0, 5).unwrap_err();
        assert_eq!(
            err,
            EnactError::InvalidConfiguration(ConfigError::Oversubscribed { requested: 5, limit: 4 })
        );
        // Nothing ran: the problem still holds its freshly allocated state.
        assert_eq!(problem.labels(&token), vec![UNVISITED; 5]);

        // An explicit grid within the limit is fine.
        enactor.enact_fused_search(&mut token, &problem, 0, 2).unwrap();
        assert_eq!(problem.labels(&token), vec![0, 1, 1, 2, 3]);
    });
}

#[test]
fn untuned_generation_is_rejected() {
    let graph = diamond_tail();
    GhostToken::new(|mut token| {
        let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
        let mut enactor = Enactor::new(false).with_device(test_device(SmVersion::SM10, 2));
        for variant in [Variant::Iterative, Variant::Fused] {
            let err = run(&mut enactor, &mut token, &problem, 0, variant).unwrap_err();
            assert_eq!(
                err,
                EnactError::InvalidConfiguration(ConfigError::NotYetTuned(SmVersion::SM10))
            );
            assert_eq!(err.status(), Status::InvalidConfiguration);
        }
        assert_eq!(problem.labels(&token), vec![UNVISITED; 5]);
    });
}

#[test]
fn oversized_lookup_views_fail_to_bind() {
    let graph = diamond_tail();
    GhostToken::new(|mut token| {
        let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
        let device = Device::new(DeviceProps {
            max_bound_elements: 3,
            ..*test_device(SmVersion::SM20, 2).props()
        })
        .unwrap();
        let mut enactor = Enactor::new(false).with_device(device);
        let err = enactor.enact_iterative_search(&mut token, &problem, 0, 0).unwrap_err();
        assert_eq!(
            err,
            EnactError::BindingFailure { what: "row offsets", len: 6, limit: 3 }
        );
        assert_eq!(enactor.last_status(), Status::BindingFailure);
    });
}

#[test]
fn source_must_be_a_vertex() {
    let graph = diamond_tail();
    GhostToken::new(|mut token| {
        let problem = BfsProblem::new(&graph, ProblemConfig::default()).unwrap();
        let mut enactor = enactor(EnactorConfig::default());
        let err = enactor.enact_iterative_search(&mut token, &problem, 5, 0).unwrap_err();
        assert_eq!(
            err,
            EnactError::InvalidConfiguration(ConfigError::SourceOutOfRange { vertex: 5, nodes: 5 })
        );
    });
}

#[test]
fn statistics_serialize() -> anyhow::Result<()> {
    let graph = diamond_tail();
    GhostToken::new(|mut token| {
        let problem = BfsProblem::new(&graph, ProblemConfig::default())?;
        let mut enactor = enactor(EnactorConfig::default().with_instrument(true));
        enactor.enact_iterative_search(&mut token, &problem, 0, 0)?;

        let stats = serde_json::to_value(enactor.statistics())?;
        assert_eq!(stats["search_depth"], 3);
        assert_eq!(stats["total_queued"], 5);
        let history = serde_json::to_value(enactor.level_history())?;
        assert_eq!(history[1]["vertices"], 2);
        Ok(())
    })
}
