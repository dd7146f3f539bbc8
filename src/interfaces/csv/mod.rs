pub mod course_reader;
