// 该文件是 Tingche （停车） 项目的一部分。
// tests/replay.rs - 回放文件驱动完整任务
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{fs, path::Path};

use serde_json::{Value, json};
use tingche::{
  FromUrl, Supervisor, TingcheConfig,
  input::ReplayFileInput,
  machine::ManualClock,
  message::Outbound,
  output::JsonlFileOutput,
  task::{ContinuousTask, Task},
};
use url::Url;

struct Script {
  lines: Vec<String>,
  t: f64,
}

impl Script {
  fn new() -> Self {
    Self {
      lines: Vec::new(),
      t: 0.0,
    }
  }

  fn frame(&mut self, detections: Value) -> &mut Self {
    self.t += 0.033;
    self
      .lines
      .push(json!({ "frame": detections, "t": self.t }).to_string());
    self
  }

  fn frames(&mut self, n: usize, detections: Value) -> &mut Self {
    for _ in 0..n {
      self.frame(detections.clone());
    }
    self
  }

  fn ack(&mut self, ack: &str) -> &mut Self {
    self.lines.push(json!({ "ack": ack }).to_string());
    self
  }

  fn write(&self, path: &Path) {
    fs::write(path, self.lines.join("\n") + "\n").unwrap();
  }
}

fn slot(x1: f32, x2: f32) -> Value {
  json!({"class_name": "parking_slot", "confidence": 0.9, "x1": x1, "y1": 300.0, "x2": x2, "y2": 600.0})
}

fn sign() -> Value {
  json!({"class_name": "parking_signboard", "confidence": 0.8, "x1": 230.0, "y1": 200.0, "x2": 270.0, "y2": 280.0})
}

fn run(script: &Script, config: TingcheConfig) -> Vec<Value> {
  let dir = tempfile::tempdir().unwrap();
  let input_path = dir.path().join("run.jsonl");
  let output_path = dir.path().join("out.jsonl");
  script.write(&input_path);

  let input = ReplayFileInput::from_url(&Url::parse(&format!("replay://{}", input_path.display())).unwrap()).unwrap();
  let output = JsonlFileOutput::from_url(&Url::parse(&format!("jsonl://{}", output_path.display())).unwrap()).unwrap();

  let clock = ManualClock::default();
  let supervisor = Supervisor::with_clock(config, clock.clone());
  ContinuousTask::default()
    .with_replay_clock(clock)
    .run_task(input, supervisor, output)
    .unwrap();

  fs::read_to_string(&output_path)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect()
}

fn payloads<'a>(messages: &'a [Value], topic: &str) -> Vec<&'a Value> {
  messages
    .iter()
    .filter(|m| m["topic"] == topic)
    .map(|m| &m["payload"])
    .collect()
}

#[test]
fn replay_runs_whole_mission() {
  let mut config = TingcheConfig::default();
  config.supervisor.exit_delay_frames = 2;

  let mut script = Script::new();
  script
    .ack("parking_zone_reached")
    .frame(json!([]))
    .frames(3, json!([slot(100.0, 400.0), sign()]))
    .frames(20, json!([]))
    .ack("stop")
    .frame(json!([]))
    .ack("turn_complete")
    .frame(json!([slot(170.0, 470.0)]))
    .ack("enter_complete")
    .frames(2, json!([]))
    .ack("rotate_complete")
    .frame(json!([]))
    // 任务结束后的帧不会被处理
    .frames(5, json!([]));

  let messages = run(&script, config);

  let commands: Vec<&str> = payloads(&messages, "anc/nav_command")
    .iter()
    .map(|p| p["command"].as_str().unwrap())
    .collect();
  assert_eq!(
    commands,
    vec![
      "STOP",
      "PAN_CAMERA_CENTER",
      "TURN_RIGHT_90",
      "STOP",
      "ENTER_SLOT",
      "STOP",
      "ROTATE_180",
      "RESUME_LANE_TRACKING",
    ]
  );

  let states: Vec<&str> = payloads(&messages, "anc/state")
    .iter()
    .map(|p| p["state"].as_str().unwrap())
    .collect();
  assert_eq!(
    states,
    vec!["LANE_FOLLOWING", "APPROACH_PARKING", "PARKING", "FINISHED"]
  );

  let summaries = payloads(&messages, "anc/detections");
  // 1 + 3 + 20 + 1 + 1 + 2 + 1
  assert_eq!(summaries.len(), 29);
  assert_eq!(summaries[1]["count"], json!(2));
  assert_eq!(summaries[1]["objects"][0]["class"], json!("parking_slot"));
}

#[test]
fn replay_reports_bumper_once() {
  let bumper = json!({"class_name": "bumper", "confidence": 0.95, "x1": 220.0, "y1": 400.0, "x2": 420.0, "y2": 600.0});
  let mut script = Script::new();
  script.frames(8, json!([bumper]));

  let messages = run(&script, TingcheConfig::default());
  let commands = payloads(&messages, "anc/nav_command");
  assert_eq!(commands.len(), 1);
  assert_eq!(commands[0]["command"], json!("BUMPER_DETECTED"));
  assert_eq!(commands[0]["metadata"]["center_y"], json!(500.0));
}

#[test]
fn replay_skips_malformed_lines_and_boxes() {
  let dir = tempfile::tempdir().unwrap();
  let input_path = dir.path().join("run.jsonl");
  fs::write(
    &input_path,
    concat!(
      "this is not json\n",
      "{\"frame\": [{\"class_name\": \"cone\", \"confidence\": 0.9, \"x1\": 50, \"y1\": 0, \"x2\": 10, \"y2\": 10}]}\n",
      "{\"ack\": \"no_such_ack\"}\n",
    ),
  )
  .unwrap();

  let input = ReplayFileInput::from_url(&Url::parse(&format!("replay://{}", input_path.display())).unwrap()).unwrap();
  let mut out: Vec<Outbound> = Vec::new();
  ContinuousTask::default()
    .run_task(input, Supervisor::with_clock(TingcheConfig::default(), ManualClock::default()), &mut out)
    .unwrap();

  let count = out.iter().find_map(|m| match m {
    Outbound::Detections(s) => Some(s.count),
    _ => None,
  });
  assert_eq!(count, Some(0));
}
