//! Translation from visual node graph to executable Plan.

use super::nodes::ExperimentNode;
use egui_snarl::{NodeId, Snarl};
use experiment::plans::{Plan, PlanCommand};
use std::collections::{HashMap, HashSet, VecDeque};

/// Errors that can occur during graph translation
#[derive(Debug, Clone)]
pub enum TranslationError {
    /// Graph contains a cycle
    CycleDetected,
    /// Node has invalid configuration
    #[allow(dead_code)]
    InvalidNode { node_id: NodeId, reason: String },
    /// Graph is empty
    EmptyGraph,
    /// No root nodes found (all nodes have inputs)
    NoRootNodes,
}

impl std::fmt::Display for TranslationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected => write!(f, "Graph contains a cycle"),
            Self::InvalidNode { node_id, reason } => {
                write!(f, "Invalid node {:?}: {}", node_id, reason)
            }
            Self::EmptyGraph => write!(f, "Graph is empty"),
            Self::NoRootNodes => write!(f, "No root nodes found"),
        }
    }
}

impl std::error::Error for TranslationError {}

/// Type alias for the adjacency result from graph analysis.
/// Contains (adjacency_map, root_nodes) for topological sorting.
type AdjacencyResult = (HashMap<NodeId, Vec<NodeId>>, Vec<NodeId>);

/// Plan generated from a visual node graph
pub struct GraphPlan {
    commands: Vec<PlanCommand>,
    current_idx: usize,
    total_events: usize,
    movers: Vec<String>,
    detectors: Vec<String>,
}

impl GraphPlan {
    /// Translate a Snarl graph into an executable GraphPlan
    pub fn from_snarl(snarl: &Snarl<ExperimentNode>) -> Result<Self, TranslationError> {
        if snarl.node_ids().count() == 0 {
            return Err(TranslationError::EmptyGraph);
        }

        // Build adjacency list and find roots
        let (adjacency, roots) = build_adjacency(snarl)?;

        if roots.is_empty() {
            return Err(TranslationError::NoRootNodes);
        }

        // Topological sort with cycle detection
        let sorted = topological_sort(&adjacency, &roots, snarl.node_ids().count())?;

        // Identify loop body nodes (these will be skipped in main traversal)
        let mut loop_body_set = HashSet::new();
        for (loop_id, loop_node) in snarl.node_ids() {
            if matches!(
                loop_node,
                ExperimentNode::Loop(..) | ExperimentNode::NestedScan(..)
            ) {
                let body_nodes = find_loop_body_nodes(loop_id, snarl);
                loop_body_set.extend(body_nodes);
            }
        }

        // Translate nodes to commands
        let mut commands = Vec::new();
        let mut movers = HashSet::new();
        let mut detectors = HashSet::new();
        let mut total_events = 0;

        for node_id in sorted {
            // Skip nodes that are part of loop bodies (they're handled by loop translation)
            if loop_body_set.contains(&node_id) {
                continue;
            }

            if let Some(node) = snarl.get_node(node_id) {
                let (node_commands, node_movers, node_detectors, node_events) =
                    translate_node_with_snarl(node, node_id, snarl);
                commands.extend(node_commands);
                movers.extend(node_movers);
                detectors.extend(node_detectors);
                total_events += node_events;
            }
        }

        Ok(Self {
            commands,
            current_idx: 0,
            total_events,
            movers: movers.into_iter().collect(),
            detectors: detectors.into_iter().collect(),
        })
    }
}

impl Plan for GraphPlan {
    fn plan_type(&self) -> &str {
        "graph_plan"
    }

    fn plan_name(&self) -> &str {
        "Graph Plan"
    }

    fn plan_args(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn movers(&self) -> Vec<String> {
        self.movers.clone()
    }

    fn detectors(&self) -> Vec<String> {
        self.detectors.clone()
    }

    fn num_points(&self) -> usize {
        self.total_events
    }

    fn next_command(&mut self) -> Option<PlanCommand> {
        if self.current_idx >= self.commands.len() {
            return None;
        }
        let cmd = self.commands[self.current_idx].clone();
        self.current_idx += 1;
        Some(cmd)
    }

    fn reset(&mut self) {
        self.current_idx = 0;
    }
}

/// Build adjacency list from snarl wires
pub fn build_adjacency(snarl: &Snarl<ExperimentNode>) -> Result<AdjacencyResult, TranslationError> {
    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut has_input: HashSet<NodeId> = HashSet::new();

    // Initialize all nodes in adjacency
    for (node_id, _) in snarl.node_ids() {
        adjacency.insert(node_id, Vec::new());
    }

    // Build edges from wires
    for (out_pin, in_pin) in snarl.wires() {
        let from = out_pin.node;
        let to = in_pin.node;
        if let Some(v) = adjacency.get_mut(&from) {
            v.push(to);
        }
        has_input.insert(to);
    }

    // Roots are nodes with no inputs
    let roots: Vec<NodeId> = snarl
        .node_ids()
        .filter(|(id, _)| !has_input.contains(id))
        .map(|(id, _)| id)
        .collect();

    Ok((adjacency, roots))
}

/// Topological sort with cycle detection using Kahn's algorithm
pub fn topological_sort(
    adjacency: &HashMap<NodeId, Vec<NodeId>>,
    roots: &[NodeId],
    total_nodes: usize,
) -> Result<Vec<NodeId>, TranslationError> {
    // Count incoming edges
    let mut in_degree: HashMap<NodeId, usize> = HashMap::new();
    for node_id in adjacency.keys() {
        in_degree.insert(*node_id, 0);
    }
    for neighbors in adjacency.values() {
        for neighbor in neighbors {
            *in_degree.get_mut(neighbor).unwrap_or(&mut 0) += 1;
        }
    }

    // Start with roots (zero in-degree)
    let mut queue: VecDeque<NodeId> = roots.iter().copied().collect();
    let mut sorted = Vec::new();

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id);
        if let Some(neighbors) = adjacency.get(&node_id) {
            for neighbor in neighbors {
                if let Some(degree) = in_degree.get_mut(neighbor) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*neighbor);
                    }
                }
            }
        }
    }

    if sorted.len() != total_nodes {
        return Err(TranslationError::CycleDetected);
    }

    Ok(sorted)
}

/// Translate a single node to PlanCommands (with access to full graph for loops)
/// Returns (commands, movers, detectors, event_count)
fn translate_node_with_snarl(
    node: &ExperimentNode,
    node_id: NodeId,
    snarl: &Snarl<ExperimentNode>,
) -> (Vec<PlanCommand>, Vec<String>, Vec<String>, usize) {
    let mut commands = vec![PlanCommand::Checkpoint {
        label: format!("node_{:?}_start", node_id),
    }];
    let mut movers = Vec::new();
    let mut detectors = Vec::new();
    let mut events = 0;

    match node {
        ExperimentNode::Scan {
            actuator,
            start,
            stop,
            points,
        } => {
            if *points > 0 && !actuator.is_empty() {
                movers.push(actuator.clone());
                let step = if *points > 1 {
                    (stop - start) / (*points as f64 - 1.0)
                } else {
                    0.0
                };
                for i in 0..*points {
                    let pos = start + step * i as f64;
                    commands.push(PlanCommand::MoveTo {
                        device_id: actuator.clone(),
                        position: pos,
                    });
                    commands.push(PlanCommand::Checkpoint {
                        label: format!("node_{:?}_point_{}", node_id, i),
                    });
                    commands.push(PlanCommand::EmitEvent {
                        stream: "primary".to_string(),
                        data: HashMap::new(),
                        positions: [(actuator.clone(), pos)].into_iter().collect(),
                    });
                    events += 1;
                }
            }
        }
        ExperimentNode::Acquire(config) => {
            if !config.detector.is_empty() {
                detectors.push(config.detector.clone());
                // Set exposure if specified
                if let Some(exposure_ms) = config.exposure_ms {
                    if exposure_ms > 0.0 {
                        commands.push(PlanCommand::Set {
                            device_id: config.detector.clone(),
                            parameter: "exposure_ms".to_string(),
                            value: exposure_ms.to_string(),
                        });
                    }
                }
                // Generate Trigger+Read for each frame in burst
                for _ in 0..config.frame_count {
                    commands.push(PlanCommand::Trigger {
                        device_id: config.detector.clone(),
                    });
                    commands.push(PlanCommand::Read {
                        device_id: config.detector.clone(),
                    });
                    commands.push(PlanCommand::EmitEvent {
                        stream: "primary".to_string(),
                        data: HashMap::new(),
                        positions: HashMap::new(),
                    });
                    events += 1;
                }
            }
        }
        ExperimentNode::Move(config) => {
            if !config.device.is_empty() {
                movers.push(config.device.clone());
                commands.push(PlanCommand::MoveTo {
                    device_id: config.device.clone(),
                    position: config.position,
                });
                if config.wait_settled {
                    // TODO: Add WaitSettled command when available
                    // For now, just add a checkpoint
                    commands.push(PlanCommand::Checkpoint {
                        label: format!("node_{:?}_settled", node_id),
                    });
                }
            }
        }
        ExperimentNode::Wait { condition } => {
            use super::nodes::WaitCondition;
            match condition {
                WaitCondition::Duration { milliseconds } => {
                    commands.push(PlanCommand::Wait {
                        seconds: *milliseconds / 1000.0,
                    });
                }
                WaitCondition::Threshold { timeout_ms, .. } => {
                    // TODO: Implement threshold-based waits
                    tracing::warn!(
                        "Threshold-based waits not yet implemented, using timeout fallback"
                    );
                    commands.push(PlanCommand::Wait {
                        seconds: *timeout_ms / 1000.0,
                    });
                }
                WaitCondition::Stability { timeout_ms, .. } => {
                    // TODO: Implement stability-based waits
                    tracing::warn!(
                        "Stability-based waits not yet implemented, using timeout fallback"
                    );
                    commands.push(PlanCommand::Wait {
                        seconds: *timeout_ms / 1000.0,
                    });
                }
            }
        }
        ExperimentNode::Loop(config) => {
            use super::nodes::LoopTermination;

            // Get loop body nodes
            let body_nodes = find_loop_body_nodes(node_id, snarl);

            // Determine iteration count based on termination mode
            let iterations = match &config.termination {
                LoopTermination::Count { iterations } => *iterations,
                LoopTermination::Condition { max_iterations, .. } => {
                    tracing::warn!(
                        "Condition-based loop at {:?} using max_iterations={} as safety limit. \
                        True condition evaluation requires RunEngine runtime support.",
                        node_id,
                        max_iterations
                    );
                    *max_iterations
                }
                LoopTermination::Infinite { max_iterations } => {
                    tracing::warn!(
                        "Infinite loop at {:?} using max_iterations={} as safety limit",
                        node_id,
                        max_iterations
                    );
                    *max_iterations
                }
            };

            // Unroll loop body N times
            for i in 0..iterations {
                commands.push(PlanCommand::Checkpoint {
                    label: format!("loop_{:?}_iter_{}_start", node_id, i),
                });

                // Translate each body node for this iteration
                for &body_node_id in &body_nodes {
                    if let Some(body_node) = snarl.get_node(body_node_id) {
                        let (body_cmds, body_movers, body_detectors, body_events) =
                            translate_node_with_snarl(body_node, body_node_id, snarl);
                        commands.extend(body_cmds);
                        movers.extend(body_movers);
                        detectors.extend(body_detectors);
                        events += body_events;
                    }
                }

                commands.push(PlanCommand::Checkpoint {
                    label: format!("loop_{:?}_iter_{}_end", node_id, i),
                });
            }
        }
        ExperimentNode::NestedScan(config) => {
            // Nested scan generates outer x inner grid with body nodes at each point
            // Get body nodes (reuse existing find_loop_body_nodes - same pin 1 convention)
            //
            // ==== ZARR INTEGRATION FOR NESTED SCANS ====
            // Nested scans produce multi-dimensional data that should be stored in Zarr format
            // with proper dimensional metadata for scientific analysis tools (xarray, napari).
            //
            // Key Zarr V3 attributes required:
            // - _ARRAY_DIMENSIONS: ["outer_dim_name", "inner_dim_name", ...] for xarray compat
            // - Each EmitEvent includes dimensional indices for Zarr coordinate assignment
            //
            // TODO: Implement Zarr writer setup:
            // 1. Create Zarr V3 store with shape (outer_points, inner_points, ...)
            // 2. Set _ARRAY_DIMENSIONS attribute with dimension names from config
            // 3. Create coordinate arrays for each dimension
            // 4. On EmitEvent, use dimensional indices to write to correct Zarr position
            //
            // Dimension naming convention:
            // - config.outer.dimension_name -> outer array dimension (e.g., "wavelength")
            // - config.inner.dimension_name -> inner array dimension (e.g., "position")
            let body_nodes = find_loop_body_nodes(node_id, snarl);

            // Add actuators to movers list
            if !config.outer.actuator.is_empty() {
                movers.push(config.outer.actuator.clone());
            }
            if !config.inner.actuator.is_empty() {
                movers.push(config.inner.actuator.clone());
            }

            // Calculate step sizes
            let outer_step = if config.outer.points > 1 {
                (config.outer.stop - config.outer.start) / (config.outer.points as f64 - 1.0)
            } else {
                0.0
            };
            let inner_step = if config.inner.points > 1 {
                (config.inner.stop - config.inner.start) / (config.inner.points as f64 - 1.0)
            } else {
                0.0
            };

            // Nested iteration: outer × inner
            for outer_idx in 0..config.outer.points {
                let outer_pos = config.outer.start + outer_step * outer_idx as f64;

                // Move outer actuator
                if !config.outer.actuator.is_empty() {
                    commands.push(PlanCommand::MoveTo {
                        device_id: config.outer.actuator.clone(),
                        position: outer_pos,
                    });
                }

                commands.push(PlanCommand::Checkpoint {
                    label: format!("nested_{:?}_outer_{}_start", node_id, outer_idx),
                });

                for inner_idx in 0..config.inner.points {
                    let inner_pos = config.inner.start + inner_step * inner_idx as f64;

                    // Move inner actuator
                    if !config.inner.actuator.is_empty() {
                        commands.push(PlanCommand::MoveTo {
                            device_id: config.inner.actuator.clone(),
                            position: inner_pos,
                        });
                    }

                    commands.push(PlanCommand::Checkpoint {
                        label: format!(
                            "nested_{:?}_outer_{}_inner_{}",
                            node_id, outer_idx, inner_idx
                        ),
                    });

                    // Execute body nodes at this point
                    for &body_node_id in &body_nodes {
                        if let Some(body_node) = snarl.get_node(body_node_id) {
                            let (body_cmds, body_movers, body_detectors, body_events) =
                                translate_node_with_snarl(body_node, body_node_id, snarl);
                            commands.extend(body_cmds);
                            movers.extend(body_movers);
                            detectors.extend(body_detectors);
                            events += body_events;
                        }
                    }

                    // Emit event with dimensional positions and indices
                    // The positions map contains actuator -> position for coordinate tracking
                    //
                    // ==== DIMENSIONAL INDEXING FOR ZARR ====
                    // For Zarr V3 multi-dimensional storage, the RunEngine needs to know
                    // which array indices to write data to. We encode this via:
                    //
                    // 1. Special position keys: "_outer_idx", "_inner_idx" (f64-encoded indices)
                    //    These are used by the Zarr writer to determine array position
                    //
                    // 2. Dimension names are passed via checkpoint labels earlier:
                    //    "nested_{node_id}_outer_{idx}_start" -> outer dimension progress
                    //    Combined with GraphPlan metadata for dimension names
                    //
                    // Example: For nested scan with outer=wavelength (10 pts), inner=position (100 pts)
                    //    positions = {
                    //      "wavelength": 450.0,  // actual wavelength value
                    //      "position": 25.5,     // actual position value
                    //      "_outer_idx": 3.0,    // outer array index (wavelength index 3)
                    //      "_inner_idx": 45.0,   // inner array index (position index 45)
                    //    }
                    //    Zarr writes to array[3, 45, ...]
                    let mut positions = HashMap::new();
                    if !config.outer.actuator.is_empty() {
                        positions.insert(config.outer.actuator.clone(), outer_pos);
                    }
                    if !config.inner.actuator.is_empty() {
                        positions.insert(config.inner.actuator.clone(), inner_pos);
                    }

                    // Include dimensional indices for Zarr coordinate assignment
                    // Convention: "_outer_idx", "_inner_idx" are reserved keys
                    positions.insert("_outer_idx".to_string(), outer_idx as f64);
                    positions.insert("_inner_idx".to_string(), inner_idx as f64);

                    commands.push(PlanCommand::EmitEvent {
                        stream: "primary".to_string(),
                        data: HashMap::new(),
                        positions,
                    });
                    events += 1;
                }

                commands.push(PlanCommand::Checkpoint {
                    label: format!("nested_{:?}_outer_{}_end", node_id, outer_idx),
                });
            }
        }
        ExperimentNode::AdaptiveScan(config) => {
            // Adaptive scan with trigger evaluation checkpoints
            // NOTE: Actual trigger evaluation happens at runtime in RunEngine
            // Translation generates checkpoints that mark where evaluation occurs

            if config.scan.points > 0 && !config.scan.actuator.is_empty() {
                movers.push(config.scan.actuator.clone());

                let step = if config.scan.points > 1 {
                    (config.scan.stop - config.scan.start) / (config.scan.points as f64 - 1.0)
                } else {
                    0.0
                };

                // Adaptive scan start checkpoint
                commands.push(PlanCommand::Checkpoint {
                    label: format!("adaptive_{:?}_start", node_id),
                });

                // Generate scan points
                for i in 0..config.scan.points {
                    let pos = config.scan.start + step * i as f64;

                    // Move actuator
                    commands.push(PlanCommand::MoveTo {
                        device_id: config.scan.actuator.clone(),
                        position: pos,
                    });

                    // Point checkpoint with trigger metadata
                    commands.push(PlanCommand::Checkpoint {
                        label: format!(
                            "adaptive_{:?}_point_{}_triggers_{}",
                            node_id,
                            i,
                            config.triggers.len()
                        ),
                    });

                    // Emit event
                    commands.push(PlanCommand::EmitEvent {
                        stream: "primary".to_string(),
                        data: HashMap::new(),
                        positions: [(config.scan.actuator.clone(), pos)].into_iter().collect(),
                    });
                    events += 1;
                }

                // Add adaptive evaluation checkpoint
                // This is where the RunEngine evaluates accumulated data against triggers
                commands.push(PlanCommand::Checkpoint {
                    label: format!("adaptive_{:?}_evaluate_action_{:?}", node_id, config.action),
                });

                // If require_approval, add an approval checkpoint
                if config.require_approval {
                    commands.push(PlanCommand::Checkpoint {
                        label: format!("adaptive_{:?}_approval_required", node_id),
                    });
                }
            }
        }
    }

    commands.push(PlanCommand::Checkpoint {
        label: format!("node_{:?}_end", node_id),
    });

    (commands, movers, detectors, events)
}

/// Find all nodes in a loop's body sub-graph.
///
/// Loop body nodes are those reachable from the loop's body output (pin 1),
/// but NOT reachable from the loop's Next output (pin 0).
fn find_loop_body_nodes(loop_node_id: NodeId, snarl: &Snarl<ExperimentNode>) -> Vec<NodeId> {
    let mut body_nodes = HashSet::new();
    let mut to_visit = VecDeque::new();

    // Find all nodes reachable from loop's body output (pin 1)
    for (out_pin, in_pin) in snarl.wires() {
        if out_pin.node == loop_node_id && out_pin.output == 1 {
            to_visit.push_back(in_pin.node);
        }
    }

    // BFS to find all reachable nodes from body output
    while let Some(node_id) = to_visit.pop_front() {
        if body_nodes.insert(node_id) {
            // Add this node's outputs to visit
            for (out_pin, in_pin) in snarl.wires() {
                if out_pin.node == node_id {
                    to_visit.push_back(in_pin.node);
                }
            }
        }
    }

    // Filter out nodes reachable from Next output (pin 0)
    let mut next_nodes = HashSet::new();
    let mut to_visit_next = VecDeque::new();
    for (out_pin, in_pin) in snarl.wires() {
        if out_pin.node == loop_node_id && out_pin.output == 0 {
            to_visit_next.push_back(in_pin.node);
        }
    }
    while let Some(node_id) = to_visit_next.pop_front() {
        if next_nodes.insert(node_id) {
            for (out_pin, in_pin) in snarl.wires() {
                if out_pin.node == node_id {
                    to_visit_next.push_back(in_pin.node);
                }
            }
        }
    }

    // Body = reachable from body output but NOT from next output
    let pure_body: Vec<NodeId> = body_nodes
        .into_iter()
        .filter(|n| !next_nodes.contains(n))
        .collect();

    // Sort topologically for correct execution order
    // Build adjacency for body nodes only
    let mut body_adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for &node_id in &pure_body {
        body_adjacency.insert(node_id, Vec::new());
    }
    for (out_pin, in_pin) in snarl.wires() {
        if pure_body.contains(&out_pin.node) && pure_body.contains(&in_pin.node) {
            if let Some(v) = body_adjacency.get_mut(&out_pin.node) {
                v.push(in_pin.node);
            }
        }
    }

    // Find roots within body (nodes with no inputs from other body nodes)
    let mut body_has_input: HashSet<NodeId> = HashSet::new();
    for neighbors in body_adjacency.values() {
        for &n in neighbors {
            body_has_input.insert(n);
        }
    }
    let body_roots: Vec<NodeId> = pure_body
        .iter()
        .filter(|n| !body_has_input.contains(n))
        .copied()
        .collect();

    // Topological sort of body nodes
    match topological_sort(&body_adjacency, &body_roots, pure_body.len()) {
        Ok(sorted) => sorted,
        Err(_) => pure_body, // Fallback to unsorted if cycle (should be caught by validation)
    }
}

/// Check if a node is part of a loop body (should be skipped in main traversal).
#[allow(dead_code)]
fn is_loop_body_node(node_id: NodeId, snarl: &Snarl<ExperimentNode>) -> bool {
    // Check if this node is reachable from any Loop node's body output
    for (loop_id, loop_node) in snarl.node_ids() {
        if matches!(loop_node, ExperimentNode::Loop(..))
            && find_loop_body_nodes(loop_id, snarl).contains(&node_id)
        {
            return true;
        }
    }
    false
}

/// Detect cycles in the graph (for validation before translation)
#[allow(dead_code)]
pub fn detect_cycles(snarl: &Snarl<ExperimentNode>) -> Option<String> {
    if snarl.node_ids().count() == 0 {
        return None; // Empty graph has no cycles
    }

    match build_adjacency(snarl) {
        Ok((adjacency, roots)) => {
            if roots.is_empty() && snarl.node_ids().count() > 0 {
                return Some("All nodes have inputs - possible cycle".to_string());
            }
            match topological_sort(&adjacency, &roots, snarl.node_ids().count()) {
                Ok(_) => None,
                Err(TranslationError::CycleDetected) => Some("Graph contains a cycle".to_string()),
                Err(e) => Some(e.to_string()),
            }
        }
        Err(e) => Some(e.to_string()),
    }
}
