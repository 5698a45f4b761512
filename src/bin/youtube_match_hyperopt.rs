extern crate rand;
extern crate recokit;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate serde_derive;

use std::fs::File;
use std::time::{Duration, Instant};

use recokit::data::user_based_split;
use recokit::evaluation::{evaluate, Metric, MetricReport};
use recokit::models::youtube_match;

const RESULTS_PATH: &str = "youtube_match_results.json";

#[derive(Debug, Serialize, Deserialize)]
struct Result {
    train_loss: f32,
    test_ndcg: f32,
    report: MetricReport,
    elapsed: Duration,
    hyperparameters: youtube_match::Hyperparameters,
}

fn main() {
    recokit::logging::init(1).unwrap();

    let mut data = recokit::datasets::load_csv("data.csv").unwrap();
    let mut rng = rand::thread_rng();

    let (train, mut test) = user_based_split(&mut data, &mut rng, 0.2);
    test.sample_negatives(1, &mut rng);

    let metrics = Metric::defaults(recokit::models::Task::Ranking);

    for _ in 0..100 {
        let mut results: Vec<Result> = File::open(RESULTS_PATH)
            .map(|file| serde_json::from_reader(&file).unwrap())
            .unwrap_or(Vec::new());

        let hyper =
            youtube_match::Hyperparameters::random(data.num_users(), data.num_items(), &mut rng);
        println!("Running {:#?}", &hyper);

        let start = Instant::now();
        let mut model = hyper.clone().build().unwrap();
        let train_loss = model.fit(&train).unwrap();
        let report = evaluate(&model, &test, 10, &metrics).unwrap();

        let result = Result {
            train_loss,
            test_ndcg: report.get(Metric::Ndcg).unwrap_or(0.0),
            report,
            elapsed: start.elapsed(),
            hyperparameters: hyper,
        };

        println!("{:#?}", result);

        if !result.test_ndcg.is_nan() {
            results.push(result);
            results.sort_by(|a, b| a.test_ndcg.partial_cmp(&b.test_ndcg).unwrap());
        }

        println!("Best result: {:#?}", results.last());

        File::create(RESULTS_PATH)
            .map(|file| serde_json::to_writer_pretty(&file, &results).unwrap())
            .unwrap();
    }
}
