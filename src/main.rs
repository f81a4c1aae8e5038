fn main() {
    survey_traverse::cli::run();
}
