//! Waveform capture. Sampling is lossless: every named signal, pin and
//! register is recorded at every event, deduplicated per signal, and
//! dumped as VCD with undefined bits emitted as `x`. The timebase is
//! one picosecond.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::bail;
use itertools::Itertools;

use crate::ir::circuit::{Circuit, Namespace};
use crate::ir::node::{NodeId, NodeKind, OutputRef};
use crate::logic::VBits;
use crate::sim::plan::{EvalPlan, SimState};

struct Watch {
    source: OutputRef,
    name: String,
    path: Vec<String>,
    width: usize,
}

struct TimeSeries {
    values: Vec<(u64, VBits)>,
}

impl TimeSeries {
    fn push(&mut self, time: u64, value: VBits) {
        if let Some((_, last)) = self.values.last() {
            if *last == value {
                return;
            }
        }
        self.values.push((time, value));
    }
}

pub struct WaveRecorder {
    watches: Vec<Watch>,
    series: Vec<TimeSeries>,
    clocks: Vec<(String, u64)>,
    last_time: u64,
}

impl WaveRecorder {
    pub fn new(circuit: &Circuit, plan: &EvalPlan) -> WaveRecorder {
        let namespace = Namespace::build(circuit);
        let mut watches = Vec::new();
        let mut seen: Vec<NodeId> = Vec::new();
        for node in circuit.iter_nodes() {
            let wanted = node.meta.name.is_some()
                || matches!(
                    node.kind,
                    NodeKind::PinInput
                        | NodeKind::PinOutput
                        | NodeKind::PinTristate
                        | NodeKind::Register(_)
                        | NodeKind::Tap
                );
            if !wanted || seen.contains(&node.id) {
                continue;
            }
            let source = match node.kind {
                NodeKind::PinOutput | NodeKind::Tap => match node.input(0) {
                    Some(src) => src,
                    None => continue,
                },
                _ if !node.outputs.is_empty() => OutputRef::new(node.id, 0),
                _ => continue,
            };
            if !plan.has_state(source.node) {
                continue;
            }
            seen.push(node.id);
            let name = namespace
                .name_of(node.id)
                .unwrap_or("anonymous")
                .to_string();
            watches.push(Watch {
                source,
                name,
                path: circuit.group_path(node.group),
                width: circuit.output_kind(source).width(),
            });
        }
        let series = watches.iter().map(|_| TimeSeries { values: vec![] }).collect();
        let clocks = circuit
            .iter_clocks()
            .map(|c| {
                let p = c.period_ps();
                (c.display_name(), (p.numer() / p.denom()) as u64)
            })
            .collect();
        WaveRecorder {
            watches,
            series,
            clocks,
            last_time: 0,
        }
    }

    pub fn sample(&mut self, _circuit: &Circuit, plan: &EvalPlan, state: &SimState, time: u64) {
        self.last_time = self.last_time.max(time);
        for (watch, series) in self.watches.iter().zip(self.series.iter_mut()) {
            series.push(time, state.read(plan, watch.source));
        }
    }

    pub fn dump_vcd<W: Write>(&self, w: W) -> anyhow::Result<()> {
        let mut writer = vcd::Writer::new(w);
        writer.timescale(1, vcd::TimescaleUnit::PS)?;

        // scope tree keyed by group path
        let mut scope = ScopeTree::default();
        for (idx, watch) in self.watches.iter().enumerate() {
            scope.insert(&watch.path, idx);
        }
        let mut codes = vec![None; self.watches.len()];
        let mut clock_codes = Vec::new();
        writer.add_module("top")?;
        for (name, _) in &self.clocks {
            clock_codes.push(writer.add_wire(1, &sanitize(name))?);
        }
        self.declare_scope(&scope, &mut writer, &mut codes)?;
        writer.upscope()?;
        writer.enddefinitions()?;

        // merge all time series into one ordered change list
        let mut changes: BTreeMap<u64, Vec<(usize, &VBits)>> = BTreeMap::new();
        for (idx, series) in self.series.iter().enumerate() {
            for (time, value) in &series.values {
                changes.entry(*time).or_default().push((idx, value));
            }
        }
        let mut clock_changes: BTreeMap<u64, Vec<(usize, bool)>> = BTreeMap::new();
        for (cidx, (_, period)) in self.clocks.iter().enumerate() {
            if *period == 0 {
                continue;
            }
            clock_changes.entry(0).or_default().push((cidx, false));
            let mut t = *period;
            while t <= self.last_time {
                clock_changes.entry(t).or_default().push((cidx, true));
                clock_changes
                    .entry(t + period / 2)
                    .or_default()
                    .push((cidx, false));
                t += period;
            }
        }

        let times: Vec<u64> = changes
            .keys()
            .chain(clock_changes.keys())
            .copied()
            .sorted()
            .dedup()
            .collect();
        for time in times {
            writer.timestamp(time)?;
            if let Some(clks) = clock_changes.get(&time) {
                for (cidx, level) in clks {
                    let code = clock_codes[*cidx];
                    writer
                        .writer()
                        .write_all(if *level { b"1" } else { b"0" })?;
                    writer.writer().write_all(code.to_string().as_bytes())?;
                    writer.writer().write_all(b"\n")?;
                }
            }
            if let Some(sigs) = changes.get(&time) {
                for (idx, value) in sigs {
                    let Some(code) = codes[*idx] else {
                        bail!("signal {} was never declared", self.watches[*idx].name);
                    };
                    write_value(&mut writer, code, value)?;
                }
            }
        }
        Ok(())
    }

    fn declare_scope<W: Write>(
        &self,
        tree: &ScopeTree,
        writer: &mut vcd::Writer<W>,
        codes: &mut [Option<vcd::IdCode>],
    ) -> anyhow::Result<()> {
        for &idx in &tree.signals {
            let watch = &self.watches[idx];
            codes[idx] = Some(writer.add_wire(watch.width as u32, &sanitize(&watch.name))?);
        }
        for (name, child) in &tree.children {
            writer.add_module(&sanitize(name))?;
            self.declare_scope(child, writer, codes)?;
            writer.upscope()?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct ScopeTree {
    children: BTreeMap<String, ScopeTree>,
    signals: Vec<usize>,
}

impl ScopeTree {
    fn insert(&mut self, path: &[String], idx: usize) {
        // the root group is the "top" module itself
        let rest = if path.first().map(String::as_str) == Some("top") {
            &path[1..]
        } else {
            path
        };
        let mut cursor = self;
        for seg in rest {
            cursor = cursor.children.entry(seg.clone()).or_default();
        }
        cursor.signals.push(idx);
    }
}

fn sanitize(name: &str) -> String {
    name.replace("::", "__").replace([' ', '.'], "_")
}

fn write_value<W: Write>(
    writer: &mut vcd::Writer<W>,
    code: vcd::IdCode,
    value: &VBits,
) -> anyhow::Result<()> {
    let mut buf = Vec::with_capacity(value.width() + 8);
    buf.push(b'b');
    for i in (0..value.width()).rev() {
        buf.push(match value.bit(i) {
            (_, false) => b'x',
            (true, true) => b'1',
            (false, true) => b'0',
        });
    }
    buf.push(b' ');
    buf.extend_from_slice(code.to_string().as_bytes());
    buf.push(b'\n');
    writer.writer().write_all(&buf)?;
    Ok(())
}
