extern crate rand;
extern crate recokit;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate serde_derive;

use std::env;
use std::fs::File;
use std::time::{Duration, Instant};

use recokit::data::train_test_split;
use recokit::evaluation::{evaluate, Metric, MetricReport};
use recokit::models::wide_deep;
use recokit::models::Task;

#[derive(Debug, Serialize, Deserialize)]
struct Result {
    train_loss: f32,
    score: f32,
    report: MetricReport,
    elapsed: Duration,
    hyperparameters: wide_deep::Hyperparameters,
}

fn main() {
    recokit::logging::init(1).unwrap();

    let task: Task = env::args()
        .nth(1)
        .unwrap_or_else(|| "rating".to_owned())
        .parse()
        .unwrap();
    let results_path = format!("wide_deep_{}_results.json", task);

    let mut data = recokit::datasets::load_csv("data.csv").unwrap();
    let mut rng = rand::thread_rng();

    let (train, mut test) = train_test_split(&mut data, &mut rng, 0.2);
    if task == Task::Ranking {
        test.sample_negatives(1, &mut rng);
    }

    let metrics = Metric::defaults(task);
    // Higher is better for every score below.
    let score = |report: &MetricReport| match task {
        Task::Rating => -report.get(Metric::Rmse).unwrap_or(std::f32::NAN),
        Task::Ranking => report.get(Metric::Ndcg).unwrap_or(std::f32::NAN),
    };

    for _ in 0..100 {
        let mut results: Vec<Result> = File::open(&results_path)
            .map(|file| serde_json::from_reader(&file).unwrap())
            .unwrap_or(Vec::new());

        let hyper =
            wide_deep::Hyperparameters::random(data.num_users(), data.num_items(), task, &mut rng);
        println!("Running {:#?}", &hyper);

        let start = Instant::now();
        let mut model = hyper.clone().build().unwrap();
        let train_loss = model.fit(&train).unwrap();
        let report = evaluate(&model, &test, 10, &metrics).unwrap();

        let result = Result {
            train_loss,
            score: score(&report),
            report,
            elapsed: start.elapsed(),
            hyperparameters: hyper,
        };

        println!("{:#?}", result);

        if !result.score.is_nan() {
            results.push(result);
            results.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap());
        }

        println!("Best result: {:#?}", results.last());

        File::create(&results_path)
            .map(|file| serde_json::to_writer_pretty(&file, &results).unwrap())
            .unwrap();
    }
}
