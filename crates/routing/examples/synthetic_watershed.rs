//! Route a storm over a synthetic comb watershed.
//!
//! Every row of a 12 x 12 grid drains east into the last column, which
//! drains south to the outlet. The last column is split into three reaches,
//! one per sub-basin. The overland, interflow and channel methods come from
//! the run configuration.
//!
//! ```bash
//! cargo run -p rivulet-routing --example synthetic_watershed -- [config.toml]
//! ```

use anyhow::{Context, Result};
use rivulet_core::config::{ChannelMethod, InterflowMethod, OverlandMethod, ReachConfig};
use rivulet_core::{Field, FieldRegistry, Raster, RoutingConfig, SubbasinTotals};
use rivulet_parallel::{Executor, ProcessingMode};
use rivulet_routing::channel::{
    CellChannelRouter, CellMethod, ChannelCellForcing, ChannelCellInputs, DiffusiveChannel, KinematicChannel,
    KinematicReach, MuskingumReach, ReachInputs, ReachMethod, ReachNetworkRouter,
};
use rivulet_routing::interflow::{
    RootZoneInputs, RootZoneInterflow, RootZoneWater, SoilLayerInputs, SoilLayerInterflow, SoilLayerParams,
    SoilLayerWater,
};
use rivulet_routing::iuh::{flow_time, CellIuhCalculator, IuhParams, StormClass, WatershedIuh};
use rivulet_routing::overland::{GammaOverland, IuhOverland, KinematicOverland, OverlandInputs, OverlandWater};
use rivulet_routing::topology::{
    build_flow_indices, build_reach_topology, build_routing_layers, CellTopology, FlowIndexParams, LayerOrigin,
    ReachChains, ReachTable, ReachTopology, RoutingLayers,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const SIZE: usize = 12;
const REACH_ROWS: usize = 4;
const STEPS: usize = 48;
const STORM_STEPS: usize = 6;
/// Rainfall intensity during the storm (mm/h)
const RAIN: f64 = 12.0;
const RUNOFF_COEFFICIENT: f64 = 0.5;

fn setup_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

/// Static description of the synthetic watershed
struct Watershed {
    cells: CellTopology,
    layers: RoutingLayers,
    stream_link: Vec<i64>,
    subbasin: Vec<i64>,
    /// Slope, Manning's n, channel width and elevation per cell
    fields: FieldRegistry,
    table: ReachTable,
    reaches: ReachTopology,
    chains: ReachChains,
}

impl Watershed {
    fn build(cell_width: f64) -> Result<Self> {
        let mut codes = Vec::with_capacity(SIZE * SIZE);
        for row in 0..SIZE {
            for col in 0..SIZE {
                codes.push(match (col + 1 < SIZE, row + 1 < SIZE) {
                    (true, _) => 1,
                    (false, true) => 7,
                    (false, false) => 0,
                });
            }
        }
        let grid = Raster::from_vec(codes, SIZE, SIZE)?.with_cell_size(cell_width);
        let cells = build_flow_indices(&grid, &FlowIndexParams::default())?;
        let layers = build_routing_layers(&cells.index, LayerOrigin::FromSource)?;

        let n = cells.index.n_nodes();
        let mut stream_link = vec![0i64; n];
        let mut subbasin = vec![0i64; n];
        let mut elevation = vec![0.0; n];
        for id in 0..n {
            let (row, col) = cells.layout.position(id).context("cell without grid position")?;
            let band = (row / REACH_ROWS + 1) as i64;
            subbasin[id] = band;
            if col + 1 == SIZE {
                stream_link[id] = band;
            }
            elevation[id] = 0.02 * cell_width * ((SIZE - 1 - row) + (SIZE - 1 - col)) as f64;
        }
        let mut fields = FieldRegistry::new(n);
        fields.fill(Field::Slope, 0.02);
        fields.fill(Field::Manning, 0.1);
        fields.insert(Field::Elevation, elevation)?;
        fields.insert(
            Field::ChannelWidth,
            stream_link.iter().map(|&l| if l > 0 { 4.0 } else { 0.0 }).collect(),
        )?;

        let n_reaches = SIZE / REACH_ROWS;
        let length = REACH_ROWS as f64 * cell_width;
        let rows: Vec<Vec<f64>> = (1..=n_reaches)
            .map(|id| {
                let down = if id == n_reaches { 0 } else { id + 1 };
                vec![id as f64, down as f64, 1.0, 4.0, length, 1.0, 0.5, 1.0e5, 0.035, 0.02]
            })
            .collect();
        let table = ReachTable::from_rows(&rows)?;
        let reaches = build_reach_topology(&table, LayerOrigin::FromSource)?;
        let chains = ReachChains::build(&cells.index, &stream_link, n_reaches)?;

        Ok(Self {
            cells,
            layers,
            stream_link,
            subbasin,
            fields,
            table,
            reaches,
            chains,
        })
    }

    fn n_cells(&self) -> usize {
        self.cells.index.n_nodes()
    }

    fn field(&self, field: Field) -> Result<&[f64]> {
        Ok(self.fields.get(field)?)
    }

    fn cell_area(&self) -> f64 {
        let w = self.cells.layout.cell_size();
        w * w
    }
}

enum Overland {
    Kinematic { router: KinematicOverland, substeps: usize },
    Iuh(IuhOverland),
    Gamma(GammaOverland),
}

impl Overland {
    fn build(config: &RoutingConfig, shed: &Watershed, exec: &Executor) -> Result<Self> {
        let dt = config.time.channel_dt;
        Ok(match config.methods.overland {
            OverlandMethod::KinematicWave => {
                let inputs = OverlandInputs {
                    slope: shed.field(Field::Slope)?,
                    manning: shed.field(Field::Manning)?,
                    stream_link: &shed.stream_link,
                    channel_width: shed.field(Field::ChannelWidth)?,
                    subbasin: &shed.subbasin,
                };
                let router = KinematicOverland::new(&shed.cells, shed.layers.clone(), &inputs, config.time.hillslope_dt)?;
                let substeps = (dt / config.time.hillslope_dt).round().max(1.0) as usize;
                Overland::Kinematic { router, substeps }
            }
            OverlandMethod::Iuh => {
                let times = flow_time(
                    &shed.cells,
                    shed.field(Field::Slope)?,
                    shed.field(Field::Manning)?,
                    &shed.stream_link,
                    StormClass::T2,
                )?;
                let params = IuhParams {
                    max_length: config.iuh.max_length,
                    dt_hours: dt / 3600.0,
                };
                let weights = vec![1.0; shed.n_cells()];
                let set = CellIuhCalculator {
                    t0: &times.t0,
                    delta: &times.delta,
                    subbasin: &shed.subbasin,
                    runoff_coefficient: &weights,
                    params,
                }
                .compute(exec)?;
                let watershed = WatershedIuh::from_cells(&set, &params);
                info!(
                    cell_support = set.max_length(),
                    watershed_support = watershed.watershed().end(),
                    "unit hydrographs ready"
                );
                Overland::Iuh(IuhOverland::new(set.cells, &shed.subbasin, shed.cell_area(), dt)?)
            }
            OverlandMethod::GammaIuh => {
                let n = shed.n_cells();
                let scale = vec![3.0; n];
                let shape = vec![1.5; n];
                Overland::Gamma(GammaOverland::new(&scale, &shape, &shed.subbasin, vec![shed.cell_area(); n], dt)?)
            }
        })
    }

    /// Route `runoff` (mm per channel step) and return the mean flow into
    /// each sub-basin's channel (m³/s)
    fn step(&mut self, exec: &Executor, runoff: &[f64]) -> Result<SubbasinTotals> {
        match self {
            Overland::Kinematic { router, substeps } => {
                let n = runoff.len();
                let mut sum = vec![0.0; router.to_channel().as_slice().len()];
                let mut ponded = vec![0.0; n];
                let mut infiltration = vec![0.0; n];
                for _ in 0..*substeps {
                    ponded.iter_mut().zip(runoff).for_each(|(p, r)| *p += r / *substeps as f64);
                    router.step(
                        exec,
                        &mut OverlandWater {
                            surface_runoff: &mut ponded,
                            infiltration_surplus: None,
                            infiltration: &mut infiltration,
                            accumulated_infiltration: None,
                        },
                    )?;
                    sum.iter_mut()
                        .zip(router.to_channel().as_slice())
                        .for_each(|(s, q)| *s += q / *substeps as f64);
                }
                Ok(SubbasinTotals::from_partial(sum)?)
            }
            Overland::Iuh(router) => {
                router.step(exec, runoff)?;
                Ok(router.to_channel().clone())
            }
            Overland::Gamma(router) => {
                let mut entering = runoff.to_vec();
                router.step(exec, &mut entering)?;
                Ok(router.to_channel().clone())
            }
        }
    }
}

enum Interflow {
    RootZone {
        router: RootZoneInterflow,
        moisture: Vec<f64>,
    },
    Layers {
        router: SoilLayerInterflow,
        water: Vec<Vec<f64>>,
    },
}

impl Interflow {
    fn build(config: &RoutingConfig, shed: &Watershed) -> Result<Self> {
        let n = shed.n_cells();
        let dt = config.time.channel_dt;
        Ok(match config.methods.interflow {
            InterflowMethod::KinematicWave => {
                let inputs = RootZoneInputs {
                    slope: shed.field(Field::Slope)?,
                    root_depth: &vec![500.0; n],
                    conductivity: &vec![20.0; n],
                    porosity: &vec![0.45; n],
                    field_capacity: &vec![0.25; n],
                    pore_index: &vec![0.4; n],
                    stream_link: &shed.stream_link,
                    channel_width: shed.field(Field::ChannelWidth)?,
                    subbasin: &shed.subbasin,
                };
                let router =
                    RootZoneInterflow::new(&shed.cells, shed.layers.clone(), &inputs, config.interflow.landuse_factor, dt)?;
                Interflow::RootZone {
                    router,
                    moisture: vec![0.35; n],
                }
            }
            InterflowMethod::SoilLayers => {
                let inputs = SoilLayerInputs {
                    slope: shed.field(Field::Slope)?,
                    thickness: &vec![vec![100.0, 300.0]; n],
                    conductivity: &vec![vec![20.0, 10.0]; n],
                    saturation: &vec![vec![45.0, 135.0]; n],
                    field_capacity: &vec![vec![25.0, 75.0]; n],
                    pore_index: &vec![vec![0.4, 0.4]; n],
                    stream_link: &shed.stream_link,
                    channel_width: shed.field(Field::ChannelWidth)?,
                    subbasin: &shed.subbasin,
                };
                let params = SoilLayerParams::from(&config.interflow);
                let router = SoilLayerInterflow::new(&shed.cells, shed.layers.clone(), &inputs, params, dt)?;
                Interflow::Layers {
                    router,
                    water: vec![vec![35.0, 100.0]; n],
                }
            }
        })
    }

    /// Interflow into each reach (m³/s); return flow is added to `runoff`
    fn step(&mut self, exec: &Executor, runoff: &mut [f64]) -> Result<SubbasinTotals> {
        match self {
            Interflow::RootZone { router, moisture } => {
                router.step(
                    exec,
                    &mut RootZoneWater {
                        soil_moisture: moisture,
                        surface_runoff: runoff,
                    },
                )?;
                Ok(router.to_channel().clone())
            }
            Interflow::Layers { router, water } => {
                router.step(
                    exec,
                    &mut SoilLayerWater {
                        soil_water: water,
                        soil_temperature: None,
                    },
                )?;
                Ok(router.to_reach().clone())
            }
        }
    }
}

enum Channel {
    Kinematic(ReachNetworkRouter<KinematicReach>),
    Muskingum(ReachNetworkRouter<MuskingumReach>),
    Diffusive(CellChannelRouter<DiffusiveChannel>),
    KinematicCell(CellChannelRouter<KinematicChannel>),
}

impl Channel {
    fn build(config: &RoutingConfig, shed: &Watershed) -> Result<Self> {
        let dt = config.time.channel_dt;
        let params: ReachConfig = config.reach.clone();
        let cell_dt = config.time.hillslope_dt;
        Ok(match config.methods.channel {
            ChannelMethod::KinematicReach => Channel::Kinematic(reach_router(KinematicReach::new(params, dt)?, shed)?),
            ChannelMethod::Muskingum => {
                Channel::Muskingum(reach_router(MuskingumReach::new(&shed.table, params, dt)?, shed)?)
            }
            ChannelMethod::DiffusiveWave => Channel::Diffusive(cell_router(DiffusiveChannel, shed, cell_dt)?),
            ChannelMethod::KinematicCell => Channel::KinematicCell(cell_router(KinematicChannel, shed, cell_dt)?),
        })
    }

    /// Route one channel step and return the outlet discharge (m³/s)
    fn step(
        &mut self,
        exec: &Executor,
        shed: &Watershed,
        surface: &SubbasinTotals,
        interflow: &SubbasinTotals,
        substeps: usize,
    ) -> Result<f64> {
        let reach_inputs = ReachInputs {
            interflow: Some(interflow.as_slice()),
            ..ReachInputs::surface(surface.as_slice())
        };
        match self {
            Channel::Kinematic(router) => {
                router.step(exec, &reach_inputs)?;
                Ok(router.outlet_discharge())
            }
            Channel::Muskingum(router) => {
                router.step(exec, &reach_inputs)?;
                Ok(router.outlet_discharge())
            }
            Channel::Diffusive(router) => route_cells(router, exec, shed, surface, interflow, substeps),
            Channel::KinematicCell(router) => route_cells(router, exec, shed, surface, interflow, substeps),
        }
    }
}

fn reach_router<M: ReachMethod>(method: M, shed: &Watershed) -> Result<ReachNetworkRouter<M>> {
    Ok(ReachNetworkRouter::new(method, shed.table.clone(), shed.reaches.clone())?)
}

fn cell_router<M: CellMethod>(method: M, shed: &Watershed, dt: f64) -> Result<CellChannelRouter<M>> {
    let inputs = ChannelCellInputs {
        slope: shed.field(Field::Slope)?,
        channel_width: shed.field(Field::ChannelWidth)?,
        elevation: Some(shed.field(Field::Elevation)?),
    };
    Ok(CellChannelRouter::new(
        method,
        &shed.cells,
        &shed.chains,
        &shed.table,
        shed.reaches.clone(),
        &inputs,
        dt,
    )?)
}

/// Spread each reach's inflow evenly over its channel cells and route the
/// cells with the hillslope step
fn route_cells<M: CellMethod>(
    router: &mut CellChannelRouter<M>,
    exec: &Executor,
    shed: &Watershed,
    surface: &SubbasinTotals,
    interflow: &SubbasinTotals,
    substeps: usize,
) -> Result<f64> {
    let n = shed.n_cells();
    let mut qs = vec![0.0; n];
    let mut qi = vec![0.0; n];
    for r in 0..shed.chains.n_reaches() {
        let chain = shed.chains.chain(r);
        let id = ReachTopology::reach_id(r);
        for &cell in chain {
            qs[cell] = surface[id] / chain.len() as f64;
            qi[cell] = interflow[id] / chain.len() as f64;
        }
    }
    let forcing = ChannelCellForcing {
        precipitation: None,
        surface: &qs,
        interflow: Some(&qi),
        groundwater: None,
    };
    let mut mean = 0.0;
    for _ in 0..substeps {
        router.step(exec, &forcing)?;
        mean += router.discharge()[0] / substeps as f64;
    }
    Ok(mean)
}

fn main() -> Result<()> {
    setup_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => RoutingConfig::from_file(&path).with_context(|| format!("loading configuration {path}"))?,
        None => RoutingConfig::default(),
    };
    config.validate()?;
    let exec = Executor::new(ProcessingMode::from_threads(config.threads))?;
    info!(methods = ?config.methods, threads = config.threads, "starting synthetic run");

    let shed = Watershed::build(config.grid.cell_width)?;
    info!(
        cells = shed.n_cells(),
        layers = shed.layers.n_layers(),
        reaches = shed.table.len(),
        "watershed built"
    );

    let mut overland = Overland::build(&config, &shed, &exec)?;
    let mut interflow = Interflow::build(&config, &shed)?;
    let mut channel = Channel::build(&config, &shed)?;
    let substeps = (config.time.channel_dt / config.time.hillslope_dt).round().max(1.0) as usize;

    let dt_hours = config.time.channel_dt / 3600.0;
    let mut peak = (0, 0.0f64);
    for step in 0..STEPS {
        let rain = if step < STORM_STEPS { RAIN * dt_hours } else { 0.0 };
        let mut runoff = vec![rain * RUNOFF_COEFFICIENT; shed.n_cells()];

        let to_reach = interflow.step(&exec, &mut runoff)?;
        let to_channel = overland.step(&exec, &runoff)?;
        let q = channel.step(&exec, &shed, &to_channel, &to_reach, substeps)?;
        if q > peak.1 {
            peak = (step, q);
        }
        info!(
            step,
            overland = to_channel.total(),
            interflow = to_reach.total(),
            outlet = q,
            "routed"
        );
    }
    info!(step = peak.0, discharge = peak.1, "peak outlet discharge");
    Ok(())
}
